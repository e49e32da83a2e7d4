//! Armazenamento de blobs em disco, um diretório por classe de arquivo.
//!
//! O [`FsBlobStore`] grava entradas enviadas pelo usuário em `inputs_dir` e
//! resultados da computação em `outputs_dir`. Os nomes lógicos derivam dos
//! identificadores dos registros, então jobs concorrentes nunca colidem.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::BlobStore;
use crate::error::BlobError;
use crate::shipment::FileClass;

/// Armazenamento de blobs baseado no sistema de arquivos local.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    inputs_dir: PathBuf,
    outputs_dir: PathBuf,
}

impl FsBlobStore {
    /// Cria os diretórios (se ainda não existirem) e retorna o armazenamento.
    pub async fn open(
        inputs_dir: impl Into<PathBuf>,
        outputs_dir: impl Into<PathBuf>,
    ) -> std::io::Result<Self> {
        let inputs_dir = inputs_dir.into();
        let outputs_dir = outputs_dir.into();
        for dir in [&inputs_dir, &outputs_dir] {
            tokio::fs::create_dir_all(dir).await?;
            tracing::debug!(dir = %dir.display(), "blob directory ready");
        }
        Ok(Self {
            inputs_dir,
            outputs_dir,
        })
    }

    fn dir(&self, class: FileClass) -> &Path {
        match class {
            FileClass::Input => &self.inputs_dir,
            FileClass::Output => &self.outputs_dir,
        }
    }

    // Rejeita nomes que escapariam do diretório da classe.
    fn checked_name(name: &str) -> Result<&str, BlobError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if valid {
            Ok(name)
        } else {
            Err(BlobError::InvalidName(name.to_string()))
        }
    }
}

impl BlobStore for FsBlobStore {
    /// Grava o conteúdo do leitor no blob. Em caso de falha, o arquivo parcial é removido.
    async fn save<R>(&self, class: FileClass, name: &str, mut reader: R) -> Result<PathBuf, BlobError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let name = Self::checked_name(name)?;
        let path = self.dir(class).join(name);
        tracing::debug!(%class, path = %path.display(), "saving blob");

        let write_err = |source| BlobError::Write {
            class,
            name: name.to_string(),
            source,
        };

        let mut file = tokio::fs::File::create(&path).await.map_err(write_err)?;
        let copied: std::io::Result<()> = async {
            tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        if let Err(source) = copied {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove partial blob");
            }
            return Err(write_err(source));
        }

        Ok(path)
    }

    async fn delete(&self, class: FileClass, name: &str) -> Result<(), BlobError> {
        let name = Self::checked_name(name)?;
        let path = self.dir(class).join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(%class, path = %path.display(), "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BlobError::Delete {
                class,
                name: name.to_string(),
                source,
            }),
        }
    }

    fn path(&self, class: FileClass, name: &str) -> PathBuf {
        self.dir(class).join(name)
    }

    async fn exists(&self, class: FileClass, name: &str) -> bool {
        match Self::checked_name(name) {
            Ok(name) => tokio::fs::try_exists(self.dir(class).join(name))
                .await
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Copia o blob para `writer` e retorna o número de bytes copiados.
    async fn load<W>(&self, class: FileClass, name: &str, mut writer: W) -> Result<u64, BlobError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let name = Self::checked_name(name)?;
        let path = self.dir(class).join(name);
        let read_err = |source: std::io::Error| {
            if source.kind() == std::io::ErrorKind::NotFound {
                BlobError::Missing {
                    class,
                    name: name.to_string(),
                }
            } else {
                BlobError::Read {
                    class,
                    name: name.to_string(),
                    source,
                }
            }
        };

        let mut file = tokio::fs::File::open(&path).await.map_err(read_err)?;
        let copied: std::io::Result<u64> = async {
            let bytes = tokio::io::copy(&mut file, &mut writer).await?;
            writer.flush().await?;
            Ok(bytes)
        }
        .await;
        let bytes = copied.map_err(read_err)?;
        tracing::debug!(%class, path = %path.display(), bytes, "blob loaded");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, FsBlobStore) {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::open(tmp.path().join("in"), tmp.path().join("out"))
            .await
            .unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn open_creates_directories() {
        let (tmp, _store) = setup().await;
        assert!(tmp.path().join("in").is_dir());
        assert!(tmp.path().join("out").is_dir());
    }

    #[tokio::test]
    async fn save_writes_into_class_directory() {
        let (tmp, store) = setup().await;
        let data: &[u8] = b"a,b\n1,2\n";

        let path = store.save(FileClass::Input, "42.csv", data).await.unwrap();
        assert_eq!(path, tmp.path().join("in").join("42.csv"));
        assert_eq!(std::fs::read(&path).unwrap(), data);
        assert_eq!(store.path(FileClass::Input, "42.csv"), path);
        assert!(store.exists(FileClass::Input, "42.csv").await);
        assert!(!store.exists(FileClass::Output, "42.csv").await);
    }

    #[tokio::test]
    async fn load_copies_blob_into_writer() {
        let (_tmp, store) = setup().await;
        store
            .save(FileClass::Output, "model", &b"weights"[..])
            .await
            .unwrap();

        let mut copy: Vec<u8> = Vec::new();
        let bytes = store
            .load(FileClass::Output, "model", &mut copy)
            .await
            .unwrap();
        assert_eq!(bytes, 7);
        assert_eq!(copy, b"weights");

        let err = store
            .load(FileClass::Output, "gone", &mut Vec::<u8>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Missing { class: FileClass::Output, .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_tmp, store) = setup().await;
        let path = store
            .save(FileClass::Output, "model", &b"bytes"[..])
            .await
            .unwrap();

        store.delete(FileClass::Output, "model").await.unwrap();
        assert!(!path.exists());
        store.delete(FileClass::Output, "model").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_names_outside_directory() {
        let (_tmp, store) = setup().await;
        for name in ["", "..", "../escape", "a/b"] {
            let err = store.save(FileClass::Input, name, &b""[..]).await.unwrap_err();
            assert!(matches!(err, BlobError::InvalidName(_)));
        }
    }
}
