//! Applying an edit and writing the original back restores the exact bytes.

use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use govfix_edit::{EditError, check_fresh, render_diff, replace_content, sha256_hex};
use proptest::prelude::*;
use tempfile::TempDir;

fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9 {}/:;._-]{0,20}", 0..12).prop_map(|lines| {
        let mut s = lines.join("\n");
        s.push('\n');
        s
    })
}

proptest! {
    #[test]
    fn apply_then_rollback_restores_original(original in arb_text(), proposed in arb_text()) {
        let td = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
        let rel = Utf8Path::new("openapi.yaml");
        fs::write(root.join(rel), &original).unwrap();

        replace_content(&root, rel, &original, &proposed).unwrap();
        prop_assert_eq!(fs::read_to_string(root.join(rel)).unwrap(), proposed.clone());

        replace_content(&root, rel, &proposed, &original).unwrap();
        prop_assert_eq!(fs::read_to_string(root.join(rel)).unwrap(), original.clone());
        prop_assert!(check_fresh(&root, rel, &sha256_hex(original.as_bytes())).is_ok());
    }

    #[test]
    fn diff_is_empty_only_when_unchanged(old in arb_text(), new in arb_text()) {
        let d = render_diff("f", &old, &new);
        prop_assert_eq!(d.is_empty(), old == new);
    }
}

#[test]
fn external_edit_makes_fix_stale() {
    let td = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
    let rel = Utf8Path::new("A.java");
    fs::write(root.join(rel), "class A {}\n").unwrap();
    fs::write(root.join(rel), "class A { int x; }\n").unwrap();

    let err = replace_content(&root, rel, "class A {}\n", "final class A {}\n").unwrap_err();
    match err {
        EditError::Stale { expected, actual, .. } => {
            assert_eq!(expected, sha256_hex(b"class A {}\n"));
            assert_eq!(actual, sha256_hex(b"class A { int x; }\n"));
        }
        other => panic!("expected stale, got {other:?}"),
    }
    assert_eq!(fs::read_to_string(root.join(rel)).unwrap(), "class A { int x; }\n");
}
