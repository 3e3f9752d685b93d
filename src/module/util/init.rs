//! This module is responsible for preparing the resources needed by the application, such as directories and configurations.
//!

pub mod resource {
    use std::path::Path;

    use super::TvcapProperty;
    use crate::module::error::Result;

    /// Initialize the application resources under `base` and return a TvcapProperty.
    ///
    /// `conf` overrides the default config location inside `base`.
    pub fn init(base: &Path, conf: Option<&Path>) -> Result<TvcapProperty> {
        // Prepare the snapshot and log directories
        let mut paths = crate::module::util::path::dir::create_app_sub_dir(base)?;
        if let Some(conf) = conf {
            paths.file.conf = conf.to_path_buf();
        }

        // Load the app configuration file, writing the defaults on first run
        let conf = crate::module::util::conf::toml::load(&paths.file.conf)?;

        Ok(TvcapProperty { path: paths, conf })
    }
}

/// This struct represents the properties of the app, such as paths and configurations.
///
#[derive(Debug, Clone)]
pub struct TvcapProperty {
    pub path: crate::module::util::path::TvcapPath, // The dataset layout
    pub conf: crate::module::util::conf::Config,    // The configurations of the app
}
