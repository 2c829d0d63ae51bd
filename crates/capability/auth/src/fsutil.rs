use crate::StoreError;
use std::io::Write;
use std::path::Path;

/// 写入同目录临时文件后原子改名覆盖；改名即提交点。文件权限 0600。
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(content)?;
    staged.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    staged.persist(path).map_err(|err| StoreError::Io(err.error))?;
    Ok(())
}

/// 打开前检查文件存在，避免以空数据静默启动。
pub(crate) fn read_existing(path: &Path) -> Result<String, StoreError> {
    std::fs::read_to_string(path).map_err(|source| StoreError::Open {
        path: path.display().to_string(),
        source,
    })
}
