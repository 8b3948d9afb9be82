use std::path::Path;
use std::sync::Arc;

pub static TAR_FILE_EXT: &str = "tar";
pub static ENCRYPTED_FILE_EXT: &str = "gpg";

/// Extension for archives produced through `tar -I <compress_program>`.
///
/// Only the program's basename matters; flags are ignored. Programs without a
/// well known extension use their own basename.
pub fn compressor_file_ext(compress_program: &str) -> Arc<str> {
    let program = compress_program
        .split_whitespace()
        .next()
        .unwrap_or_default();
    let base = Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program);

    match base {
        "xz" | "pixz" => "xz".into(),
        "gzip" | "pigz" => "gz".into(),
        "bzip2" | "pbzip2" | "lbzip2" => "bz2".into(),
        "zstd" | "pzstd" => "zst".into(),
        "lz4" => "lz4".into(),
        "lzip" | "plzip" => "lz".into(),
        "lzop" => "lzo".into(),
        "brotli" => "br".into(),
        other => other.into(),
    }
}
