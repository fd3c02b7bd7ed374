pub mod admin;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use crate::CoreContext;
    use crate::config::AuthnConfig;

    pub fn test_config(home: &Path) -> AuthnConfig {
        AuthnConfig::new(home)
    }

    /// Started core in a fresh temp directory.
    pub fn context() -> (tempfile::TempDir, Arc<CoreContext>) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CoreContext::start(test_config(dir.path())).unwrap();
        (dir, ctx)
    }
}
