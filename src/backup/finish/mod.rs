use liblzma::write::XzEncoder;
use std::io::{Error, Write};

/// Flushes trailing frames of a layered writer and hands back the writer it
/// wraps.
pub trait Finish<O> {
    fn finish(self) -> Result<O, Error>;
}

impl<W: Write> Finish<W> for XzEncoder<W> {
    fn finish(self) -> Result<W, Error> {
        self.finish()
    }
}
