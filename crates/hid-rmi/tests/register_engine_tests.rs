//! Register engine behaviour against the simulated device.

use hid_rmi::mock::SimulatedRmi;
use hid_rmi::protocol::{ReportSizes, report_ids};
use hid_rmi::{RegisterEngine, RmiConfig, RmiError, TransportError};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn config(read_timeout_ms: u64) -> RmiConfig {
    RmiConfig {
        read_timeout_ms,
        max_read_attempts: 5,
        ..RmiConfig::default()
    }
}

fn connected(config: RmiConfig) -> Result<(Arc<SimulatedRmi>, Arc<RegisterEngine>), RmiError> {
    let sim = SimulatedRmi::new(ReportSizes::default()).map_err(TransportError::from)?;
    let engine = Arc::new(RegisterEngine::new(sim.clone(), config)?);
    let weak = Arc::downgrade(&engine);
    sim.connect(move |report: &[u8]| {
        if let Some(engine) = weak.upgrade() {
            engine.complete_read(report);
        }
    });
    Ok((sim, engine))
}

// ── Page selection ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    /// A page select goes out exactly when the target page differs from the
    /// last selected one, and every access lands on the selected page.
    #[test]
    fn prop_page_select_only_on_page_change(
        addrs in proptest::collection::vec(0u16..0x0400, 1..24),
    ) {
        let (sim, engine) = connected(config(500))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let mut expected = Vec::new();
        let mut page = 0u8;
        for addr in &addrs {
            let target = (addr >> 8) as u8;
            if target != page {
                expected.push(target);
                page = target;
            }
            engine
                .write_block(*addr, &[0x5A])
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }

        prop_assert_eq!(sim.page_selects(), expected);
        prop_assert_eq!(sim.page_violations(), 0);
        prop_assert_eq!(engine.current_page(), page);
    }
}

#[test]
fn test_explicit_set_page_always_writes() -> TestResult {
    let (sim, engine) = connected(config(500))?;
    engine.set_page(3)?;
    engine.set_page(3)?;
    assert_eq!(sim.page_selects(), vec![3, 3]);

    let reports = sim.output_reports();
    let first = reports.first().ok_or("no output report")?;
    assert_eq!(first.len(), ReportSizes::default().output);
    assert_eq!(first.get(..5), Some(&[report_ids::WRITE, 1, 0xFF, 0x00, 3][..]));
    Ok(())
}

#[test]
fn test_read_across_pages_selects_page() -> TestResult {
    let (sim, engine) = connected(config(500))?;
    sim.load(0x0210, &[1, 2, 3]);
    assert_eq!(engine.read_block(0x0210, 3)?, vec![1, 2, 3]);
    assert_eq!(sim.page(), 2);
    assert_eq!(sim.page_violations(), 0);
    Ok(())
}

// ── Read protocol ───────────────────────────────────────────────────────────

#[test]
fn test_read_retries_until_answered() -> TestResult {
    let (sim, engine) = connected(config(40))?;
    sim.load(0x0010, &[0xC0, 0xDE]);
    sim.drop_next_reads(4);

    assert_eq!(engine.read_block(0x0010, 2)?, vec![0xC0, 0xDE]);
    assert_eq!(sim.read_requests(), 5);
    assert!(!engine.is_read_pending());
    Ok(())
}

#[test]
fn test_read_gives_up_after_max_attempts() -> TestResult {
    let (sim, engine) = connected(config(40))?;
    sim.drop_next_reads(5);

    let result = engine.read_block(0x0010, 2);
    assert!(matches!(
        result,
        Err(RmiError::ProtocolTimeout {
            addr: 0x0010,
            attempts: 5
        })
    ));
    assert_eq!(sim.read_requests(), 5);
    assert!(!engine.is_read_pending());

    // the engine is usable again afterwards
    sim.load(0x0010, &[7]);
    assert_eq!(engine.read_byte(0x0010)?, 7);
    Ok(())
}

#[test]
fn test_read_accumulates_chunks() -> TestResult {
    let (sim, engine) = connected(config(500))?;
    let data: Vec<u8> = (0x10..0x1A).collect();
    sim.load(0x0040, &data);
    sim.set_chunk_limit(Some(6));

    assert_eq!(engine.read_block(0x0040, 10)?, data);
    assert_eq!(sim.read_requests(), 1);
    Ok(())
}

#[test]
fn test_read_longer_than_one_report() -> TestResult {
    let (sim, engine) = connected(config(500))?;
    let data: Vec<u8> = (0..100u8).collect();
    sim.load(0x0300, &data);
    assert_eq!(engine.read_block(0x0300, data.len())?, data);
    Ok(())
}

#[test]
fn test_concurrent_transactions_do_not_interleave() -> TestResult {
    let (sim, engine) = connected(config(500))?;
    sim.load(0x0120, &[0x11; 4]);
    sim.load(0x0220, &[0x22; 4]);

    let workers: Vec<_> = [(0x0120u16, 0x11u8), (0x0220, 0x22)]
        .into_iter()
        .map(|(addr, value)| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || -> Result<(), RmiError> {
                for _ in 0..20 {
                    let data = engine.read_block(addr, 4)?;
                    assert_eq!(data, vec![value; 4]);
                }
                Ok(())
            })
        })
        .collect();

    for worker in workers {
        worker
            .join()
            .map_err(|panic| format!("reader thread panicked: {panic:?}"))??;
    }
    assert_eq!(sim.page_violations(), 0);
    Ok(())
}
