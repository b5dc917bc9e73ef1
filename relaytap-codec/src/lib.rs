mod compress;
mod error;

pub use compress::{
    ContentEncoding, decode_content, deflate_compress, deflate_decompress, gzip_compress,
    gzip_decompress,
};
pub use error::CodecError;
