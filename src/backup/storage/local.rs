use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithFnName, WithMsg};
use crate::backup::storage::{check_object_name, config_str, Storage, StorageConfig};
use crate::backup::validate::validate_dir_exist;
use function_name::named;
use getset::Getters;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, IntoInnerError, Read};
use std::path::PathBuf;

/// Stores objects as files in a local directory, e.g. a mounted volume.
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        validate_dir_exist(&root)?;
        Ok(Self { root })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(config_str(config, "root")?)
    }
}

impl Storage for LocalStorage {
    #[named]
    fn write_stream(&self, name: &str, stream: &mut dyn Read) -> Result<u64> {
        check_object_name(name)?;
        let target = self.root.join(name);
        let tmp = self.root.join(format!(".{name}.tmp"));

        let res = File::create(&tmp)
            .map(BufWriter::new)
            .and_then(|mut writer| {
                let written = std::io::copy(stream, &mut writer)?;
                writer
                    .into_inner()
                    .map_err(IntoInnerError::into_error)?
                    .sync_all()?;
                Ok(written)
            })
            .and_then(|written| std::fs::rename(&tmp, &target).map(|_| written))
            .map_err(Error::from);

        match res {
            Ok(written) => {
                tracing::info!("Stored {} bytes as {:?}", written, target);
                Ok(written)
            }
            Err(mut e) => {
                if let Err(e2) = std::fs::remove_file(&tmp) {
                    if e2.kind() != ErrorKind::NotFound {
                        e = e.chain(e2.into());
                    }
                }
                Err(e)
                    .with_msg(format!("Storing {:?} failed", target))
                    .with_fn_name(function_path!())
            }
        }
    }

    fn delete(&self, name: &str) -> Result<()> {
        check_object_name(name)?;
        let target = self.root.join(name);
        match std::fs::remove_file(&target) {
            Ok(_) => {
                tracing::info!("Deleted {:?}", target);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Nothing to delete at {:?}", target);
                Ok(())
            }
            Err(e) => Err(Error::from(e).with_msg(format!("Deleting {:?} failed", target))),
        }
    }
}
