pub mod context;
pub mod driver;
pub mod env_path;
pub mod file_ext;
pub mod hooks;
pub mod ini;
pub mod passphrase;
pub mod pipeline;
pub mod process;
pub mod prompt;
pub mod redacted;
pub mod result_error;
pub mod run;
pub mod target;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
