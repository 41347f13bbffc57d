//! Integration tests for the `ctlab-rs` crate.
//!
//! These tests exercise the high-level API through the crate root re-exports,
//! ensuring that framing, the engine and the device directory work together.

use ctlab_rs::{connect, init_logger, log_info, Ctlab, CtlabError, DeviceSlot, MockTransport};

#[tokio::test]
async fn test_connect_to_missing_port() {
    let result = connect("/dev/ctlab-does-not-exist", false).await;
    assert!(matches!(result, Err(CtlabError::SerialPortError(_))));
}

#[tokio::test]
async fn test_round_trip_through_facade() -> Result<(), CtlabError> {
    init_logger();
    log_info("facade round trip");

    let mock = MockTransport::with_responder(|req| match (req.device_index(), req.command()) {
        (2, "idn?") => Some("#2:255=[DCG 1.0]".to_string()),
        (2, "msw?") => Some("#2:12=7.25".to_string()),
        (2, _) => Some("#2:[OK]".to_string()),
        _ => Some(req.render()),
    });
    let mut lab = Ctlab::new(mock.clone());
    lab.discover(false).await?;

    assert_eq!(lab.index_of(DeviceSlot::Dcg)?, 2);
    lab.dcg_set_voltage(12.0).await?;
    assert_eq!(lab.dcg_measure_power().await?, 7.25);

    let idn = lab.slot_query(DeviceSlot::Dcg, "idn?").await?;
    assert_eq!(idn, "#2:255=[DCG 1.0]");
    Ok(())
}
