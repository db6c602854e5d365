mod platform;
mod procfs;

pub(crate) use platform::*;
pub(crate) use procfs::*;
