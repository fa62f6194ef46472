//! Pairing persistence on disk

use glasslink_ble::{PairingRecord, PairingStore};
use glasslink_core::protocol::serial::decode_serial;
use glasslink_core::{Side, SideIdentity};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_missing_file_is_empty_record() {
    let dir = TempDir::new().unwrap();
    let store = PairingStore::new(Some(dir.path().join("pairing.json")));
    assert_eq!(store.load().unwrap(), PairingRecord::default());
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("pairing.json");
    let store = PairingStore::new(Some(path.clone()));

    let mut record = PairingRecord::default();
    record.set_search_filter(Some("_74_".into()));
    record.set_identity(
        Side::Left,
        SideIdentity::new("PeripheralId(AA)", "Even G1_74_L_3A5B1C"),
    );
    record.set_identity(
        Side::Right,
        SideIdentity::new("PeripheralId(BB)", "Even G1_74_R_3A5B1C"),
    );
    record.glasses = decode_serial("S110LBA0200001");
    assert_ok!(store.save(&record));

    assert!(path.exists());
    let loaded = PairingStore::new(Some(path)).load().unwrap();
    assert_eq!(loaded, record);
    assert!(loaded.is_paired());
    assert_eq!(
        loaded.identity(Side::Right).map(|i| i.name.as_str()),
        Some("Even G1_74_R_3A5B1C")
    );
}

#[test]
fn test_forget_clears_everything() {
    let dir = TempDir::new().unwrap();
    let store = PairingStore::new(Some(dir.path().join("pairing.json")));

    let mut record = PairingRecord::default();
    record.set_identity(Side::Left, SideIdentity::new("a", "Even G1_74_L_1"));
    store.save(&record).unwrap();

    record.forget();
    store.save(&record).unwrap();
    assert_eq!(store.load().unwrap(), PairingRecord::default());
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pairing.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert_err!(PairingStore::new(Some(path)).load());
}
