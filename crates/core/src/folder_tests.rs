use super::*;

#[test]
fn git_fingerprint_is_the_git_id() {
    let src = FolderSource::Git {
        git_id: "hello".to_string(),
    };
    assert_eq!(src.fingerprint().as_deref(), Some("hello"));
}

#[test]
fn local_fingerprint_is_path_basename() {
    let src = FolderSource::Local {
        path: "/home/user/my-project".to_string(),
    };
    assert_eq!(src.fingerprint().as_deref(), Some("my-project"));
}

#[test]
fn globus_fingerprint_is_sanitized() {
    let src = FolderSource::Globus {
        endpoint: "ep/1".to_string(),
        path: "/data set/run 1".to_string(),
    };
    let fp = src.fingerprint().unwrap();
    assert!(fp.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}

#[test]
fn empty_source_has_no_fingerprint() {
    assert_eq!(FolderSource::Empty.fingerprint(), None);
}

#[test]
fn new_folder_is_not_deleted() {
    let folder = Folder::new(
        FolderId::new("f1"),
        HpcId::new("expanse"),
        UserId::new("u1"),
        "/scratch/oj/f1",
    );
    assert!(!folder.deleted);
    assert!(folder.globus_path.is_none());
}
