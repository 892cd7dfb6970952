//! Which launcher the shared crate is running under.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Web,
    Desktop,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::Web
        } else {
            Self::Desktop
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Desktop => "desktop",
        }
    }

    /// Name of the backend [`platform_store`](super::storage::platform_store) opens.
    pub fn storage_backend(self) -> &'static str {
        match self {
            Self::Web => "localStorage",
            Self::Desktop => "files",
        }
    }
}
