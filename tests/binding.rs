//! Binding integration tests
//!
//! Bind, rebind and replacement flows through the service facade

use homelink::{Error, ErrorKind};

mod common;
use common::{
    DOMAIN, SUB_DOMAIN, create_home, home_with_devices, register_master, register_slave,
    setup_service, test_config,
};

#[test]
fn test_master_with_slaves() {
    let svc = setup_service();
    let (hid, master, slaves) = home_with_devices(&svc, 3);

    assert_eq!(slaves.len(), 3);
    let devices = svc.devices().get_all_devices(DOMAIN, hid).unwrap();
    assert_eq!(devices.len(), 4);

    let master_row = svc.devices().get(DOMAIN, master).unwrap().unwrap();
    assert!(master_row.is_master());
    for did in &slaves {
        let row = svc.devices().get(DOMAIN, *did).unwrap().unwrap();
        assert_eq!(row.master_did, master);
        assert_eq!(row.hid, hid);
    }
}

#[test]
fn test_rebind_keeps_did_and_moves_home() {
    let svc = setup_service();
    let first_home = create_home(&svc);
    let second_home = create_home(&svc);
    register_master(&svc, "m");

    let did = svc
        .bindings()
        .binding(DOMAIN, SUB_DOMAIN, "m", "hub", first_home, -1)
        .unwrap();
    let again = svc
        .bindings()
        .binding(DOMAIN, SUB_DOMAIN, "m", "renamed", second_home, -1)
        .unwrap();

    assert_eq!(did, again);
    let row = svc.devices().get(DOMAIN, did).unwrap().unwrap();
    assert_eq!(row.hid, second_home);
    assert_eq!(row.name, "renamed");
    assert!(svc.devices().get_all_devices(DOMAIN, first_home).unwrap().is_empty());
}

#[test]
fn test_bind_rejections() {
    let svc = setup_service();
    let hid = create_home(&svc);
    register_slave(&svc, "lonely");

    let err = svc
        .bindings()
        .binding(DOMAIN, SUB_DOMAIN, "unknown", "x", hid, -1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDevice);

    let err = svc
        .bindings()
        .binding(DOMAIN, SUB_DOMAIN, "lonely", "x", hid, 12345)
        .unwrap_err();
    assert!(matches!(err, Error::NotYetBinded(_)));

    // Nothing was written by the failed attempts
    assert!(svc.devices().get_all_devices(DOMAIN, hid).unwrap().is_empty());
}

#[test]
fn test_replace_master_device() {
    let svc = setup_service();
    let (hid, master, slaves) = home_with_devices(&svc, 2);
    register_master(&svc, "replacement");

    svc.bindings()
        .change_binding(master, DOMAIN, SUB_DOMAIN, "replacement")
        .unwrap();

    let binding = svc.bindings().get(DOMAIN, master).unwrap().unwrap();
    assert_eq!(binding.device_id, "replacement");
    assert!(binding.grant_token.is_none());
    assert!(
        svc.bindings()
            .get_binding_info(DOMAIN, SUB_DOMAIN, "master")
            .unwrap()
            .is_none()
    );

    // Slaves still route through the same did
    let point = svc.get_access_point(common::OWNER_UID, DOMAIN, slaves[0]).unwrap();
    assert_eq!(point.device_id, "replacement");
    assert_eq!(svc.devices().get_all_devices(DOMAIN, hid).unwrap().len(), 3);
}

#[test]
fn test_change_binding_of_frozen_device() {
    let svc = setup_service();
    let (_hid, master, _slaves) = home_with_devices(&svc, 0);
    register_master(&svc, "replacement");
    svc.devices().disable(DOMAIN, master).unwrap();

    assert!(matches!(
        svc.bindings()
            .change_binding(master, DOMAIN, SUB_DOMAIN, "replacement"),
        Err(Error::InvalidStatus(_))
    ));
}

#[test]
fn test_delete_master_cascades() {
    let svc = setup_service();
    let (hid, master, slaves) = home_with_devices(&svc, 3);

    svc.devices().delete_device(DOMAIN, hid, master).unwrap();

    assert!(svc.devices().get_all_devices(DOMAIN, hid).unwrap().is_empty());
    for did in slaves {
        assert!(svc.devices().get(DOMAIN, did).unwrap().is_none());
    }
    // The mapping survives; rebinding the master keeps its did
    assert_eq!(
        svc.bindings()
            .binding(DOMAIN, SUB_DOMAIN, "master", "hub", hid, -1)
            .unwrap(),
        master
    );
}

#[test]
fn test_domains_are_isolated() {
    let svc = setup_service();
    register_master(&svc, "m");

    assert!(svc.warehouse().get("other", SUB_DOMAIN, "m").unwrap().is_none());
    svc.warehouse()
        .register("other", SUB_DOMAIN, "m", "pk", true)
        .unwrap();
    assert!(svc.warehouse().get("other", SUB_DOMAIN, "m").unwrap().is_some());
}

#[test]
fn test_concurrent_binding_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let pool = homelink::db::init(dir.path().join("homelink.db"), 4).unwrap();
    let svc = homelink::DeviceService::new(pool, &test_config()).unwrap();
    let (hid, master, _) = home_with_devices(&svc, 0);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let svc = svc.clone();
            std::thread::spawn(move || {
                for i in 0..5 {
                    let device_id = format!("t{t}-{i}");
                    register_slave(&svc, &device_id);
                    let did = svc
                        .bindings()
                        .binding(DOMAIN, SUB_DOMAIN, &device_id, &device_id, hid, master)
                        .unwrap();
                    assert!(svc.bindings().get(DOMAIN, did).unwrap().is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let devices = svc.devices().get_all_devices(DOMAIN, hid).unwrap();
    assert_eq!(devices.len(), 21);
    let mut dids: Vec<_> = devices.iter().map(|d| d.did).collect();
    dids.dedup();
    assert_eq!(dids.len(), 21);
}

#[test]
fn test_concurrent_first_bind_of_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let pool = homelink::db::init(dir.path().join("homelink.db"), 4).unwrap();
    let svc = homelink::DeviceService::new(pool, &test_config()).unwrap();
    let hid = create_home(&svc);
    register_master(&svc, "shared");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let svc = svc.clone();
            std::thread::spawn(move || {
                svc.bindings()
                    .binding(DOMAIN, SUB_DOMAIN, "shared", "hub", hid, -1)
                    .unwrap()
            })
        })
        .collect();
    let dids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(dids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(svc.devices().get_all_devices(DOMAIN, hid).unwrap().len(), 1);
}
