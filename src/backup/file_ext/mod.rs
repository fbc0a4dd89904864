/// Supplies the file name extension a component contributes to the backup
/// object name, e.g. `xz` for `backup.tar.xz`.
pub trait FileExtProvider {
    fn file_ext(&self) -> Option<&'static str>;
}
