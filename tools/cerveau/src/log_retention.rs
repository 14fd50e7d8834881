use crate::errors::CerveauError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Renames `active` to `<stem>-<unix nanos>.jsonl` in the same directory so
/// the next append starts a fresh file.
pub fn rotate_active_log(active: &Path) -> Result<Option<PathBuf>, CerveauError> {
    if !active.is_file() {
        return Ok(None);
    }
    let stem = active
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "run".to_string());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut target = active.with_file_name(format!("{stem}-{nanos:020}.jsonl"));
    let mut suffix = 1;
    while target.exists() {
        target = active.with_file_name(format!("{stem}-{nanos:020}-{suffix}.jsonl"));
        suffix += 1;
    }
    fs::rename(active, &target).map_err(|e| CerveauError::Io(e.to_string()))?;
    Ok(Some(target))
}

/// Deletes the oldest `.jsonl` siblings of `active` until the directory's
/// log total fits `budget_bytes`. The active file is never removed.
pub fn prune_rotated_logs(active: &Path, budget_bytes: u64) -> Result<Vec<PathBuf>, CerveauError> {
    let Some(dir) = active.parent() else {
        return Ok(Vec::new());
    };
    let logs = fs::read_dir(dir)
        .map_err(|e| CerveauError::Io(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
        .filter_map(|path| {
            let meta = fs::metadata(&path).ok()?;
            Some((path, meta.len(), meta.modified().ok()))
        })
        .collect::<Vec<_>>();

    let mut total = logs.iter().map(|(_, len, _)| *len).sum::<u64>();
    let mut rotated = logs
        .into_iter()
        .filter(|(path, _, _)| path.as_path() != active)
        .collect::<Vec<_>>();
    rotated.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0)));

    let mut deleted = Vec::new();
    for (path, len, _) in rotated {
        if total <= budget_bytes {
            break;
        }
        fs::remove_file(&path).map_err(|e| CerveauError::Io(e.to_string()))?;
        total = total.saturating_sub(len);
        deleted.push(path);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::{prune_rotated_logs, rotate_active_log};
    use std::fs;

    #[test]
    fn prunes_oldest_rotated_logs_and_keeps_active() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("old.jsonl"), vec![0u8; 40]).expect("old");
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(dir.path().join("newer.jsonl"), vec![0u8; 40]).expect("newer");
        let active = dir.path().join("run.jsonl");
        fs::write(&active, vec![0u8; 40]).expect("active");
        fs::write(dir.path().join("notes.txt"), vec![0u8; 400]).expect("other");

        let deleted = prune_rotated_logs(&active, 90).expect("pruned");
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].ends_with("old.jsonl"));
        assert!(active.exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn active_log_survives_even_over_budget() {
        let dir = tempfile::tempdir().expect("tempdir");
        let active = dir.path().join("run.jsonl");
        fs::write(&active, vec![0u8; 400]).expect("active");
        let deleted = prune_rotated_logs(&active, 10).expect("pruned");
        assert!(deleted.is_empty());
        assert!(active.exists());
    }

    #[test]
    fn rotation_moves_active_aside_and_skips_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let active = dir.path().join("run.jsonl");
        assert_eq!(rotate_active_log(&active).expect("missing is fine"), None);

        fs::write(&active, "{}\n").expect("active");
        let first = rotate_active_log(&active)
            .expect("rotate")
            .expect("rotated path");
        assert!(!active.exists());
        assert_eq!(fs::read_to_string(&first).expect("rotated"), "{}\n");
        let name = first.file_name().expect("name").to_string_lossy().to_string();
        assert!(name.starts_with("run-") && name.ends_with(".jsonl"), "{name}");

        fs::write(&active, "{}\n").expect("active again");
        let second = rotate_active_log(&active)
            .expect("rotate")
            .expect("rotated path");
        assert_ne!(first, second);
    }
}
