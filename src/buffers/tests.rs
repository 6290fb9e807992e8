use super::*;

#[test]
fn test_scratch_exists_at_start() {
    let mgr = BufferManager::new();
    assert_eq!(mgr.len(), 1);
    let scratch = mgr.get(mgr.scratch_id()).unwrap();
    assert_eq!(scratch.display_name(), crate::constants::ui::SCRATCH_NAME);
    assert!(scratch.file.is_none());
}

#[test]
fn test_open_file_and_dedupe_by_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.rs");
    std::fs::write(&path, b"fn main() {}\n").unwrap();

    let mut mgr = BufferManager::new();
    let id1 = mgr.open_file(&path, false).unwrap();
    let id2 = mgr.open_file(&path, false).unwrap();
    assert_eq!(id1, id2);
    assert_eq!(mgr.len(), 2);
    assert_eq!(mgr.get(id1).unwrap().language.name, "rust");
}

#[test]
fn test_open_through_symlink_reuses_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("real.txt");
    std::fs::write(&real, b"x\n").unwrap();
    let link = dir.path().join("link.txt");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let mut mgr = BufferManager::new();
    let id1 = mgr.open_file(&real, false).unwrap();
    let id2 = mgr.open_file(&link, false).unwrap();
    assert_eq!(id1, id2);
}

#[test]
fn test_open_missing_file_is_empty_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("new.txt");
    let mut mgr = BufferManager::new();
    let id = mgr.open_file(&path, false).unwrap();
    let state = mgr.get(id).unwrap();
    assert!(state.buffer.is_empty());
    assert!(state.file.as_ref().unwrap().mtime.is_none());
}

#[test]
fn test_delete_rebinds_to_scratch() {
    let mut mgr = BufferManager::new();
    let id = mgr.create("tmp", b"data".to_vec());
    let target = mgr.delete(id);
    assert_eq!(target, mgr.scratch_id());
    assert!(mgr.get(id).is_none());
}

#[test]
fn test_delete_scratch_just_empties_it() {
    let mut mgr = BufferManager::new();
    let sid = mgr.scratch_id();
    mgr.get_mut(sid).unwrap().buffer.insert(0, b"junk");
    let target = mgr.delete(sid);
    assert_eq!(target, sid);
    assert!(mgr.get(sid).unwrap().buffer.is_empty());
}

#[test]
fn test_next_after_cycles() {
    let mut mgr = BufferManager::new();
    let a = mgr.create("a", Vec::new());
    let b = mgr.create("b", Vec::new());
    let s = mgr.scratch_id();
    assert_eq!(mgr.next_after(s), a);
    assert_eq!(mgr.next_after(a), b);
    assert_eq!(mgr.next_after(b), s);
}
