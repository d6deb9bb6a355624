use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Source of the device/installation identifier used in record ids.
///
/// The core treats the identifier as an opaque string and never validates
/// its format; platform shells plug in their own provider.
pub trait IdentifierProvider: Send + Sync {
    fn device_id(&self) -> String;
}

/// Default provider: a generated installation id persisted next to the
/// queue storage, stable for the lifetime of the install.
#[derive(Debug, Clone)]
pub struct StoredInstallationId {
    id: String,
}

impl StoredInstallationId {
    pub fn load_or_create(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join("installation_id");

        match fs::read_to_string(&path) {
            Ok(existing) if !existing.trim().is_empty() => Ok(Self {
                id: existing.trim().to_string(),
            }),
            Ok(_) => Self::generate(&path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::generate(&path),
            Err(e) => Err(e),
        }
    }

    fn generate(path: &Path) -> std::io::Result<Self> {
        let id = Uuid::new_v4().to_string();
        fs::write(path, &id)?;
        Ok(Self { id })
    }
}

impl IdentifierProvider for StoredInstallationId {
    fn device_id(&self) -> String {
        self.id.clone()
    }
}
