pub mod archiver;
pub mod compress;
pub mod dump;
pub mod file_ext;
pub mod finish;
pub mod job;
pub mod manifest;
pub mod notifications;
pub mod path_matcher;
pub mod redacted;
pub mod report;
pub mod result_error;
pub mod run;
pub mod run_errors;
pub mod selector;
pub mod storage;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
