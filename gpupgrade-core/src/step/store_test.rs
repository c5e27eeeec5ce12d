use anyhow::{bail, Result};

use super::*;

#[tokio::test]
async fn missing_log_reads_as_pending() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = StatusStore::new(dir.path());

    let status = store.substep_status(Phase::Execute, Substep::UpgradePrimaries).await?;
    assert!(status == Status::Pending, "expected pending, got {}", status);
    assert!(store.entries().await?.is_empty(), "expected no entries");
    Ok(())
}

#[tokio::test]
async fn entries_are_appended_in_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = StatusStore::new(dir.path());

    store.write_phase(Phase::Execute, Status::Running).await?;
    store.write(Phase::Execute, Substep::UpgradePrimaries, Status::Running).await?;
    store.write(Phase::Execute, Substep::UpgradePrimaries, Status::Complete).await?;

    let entries = store.entries().await?;
    let expected = vec![
        Entry { phase: Phase::Execute, substep: None, status: Status::Running },
        Entry { phase: Phase::Execute, substep: Some(Substep::UpgradePrimaries), status: Status::Running },
        Entry { phase: Phase::Execute, substep: Some(Substep::UpgradePrimaries), status: Status::Complete },
    ];
    assert!(entries == expected, "unexpected entries {:?}", entries);

    let raw = tokio::fs::read_to_string(store.path()).await?;
    let last = raw.lines().last().unwrap_or_default();
    assert!(
        last == r#"{"phase":"execute","substep":"upgrade_primaries","status":"complete"}"#,
        "unexpected log line {}",
        last
    );
    Ok(())
}

#[tokio::test]
async fn complete_is_terminal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = StatusStore::new(dir.path());
    store.write(Phase::Finalize, Substep::SwapDataDirectories, Status::Running).await?;
    store.write(Phase::Finalize, Substep::SwapDataDirectories, Status::Complete).await?;

    let res = store.write(Phase::Finalize, Substep::SwapDataDirectories, Status::Pending).await;
    let err = match res {
        Ok(()) => bail!("expected complete -> pending to be rejected"),
        Err(err) => err,
    };
    assert!(
        matches!(err.downcast_ref::<StepError>(), Some(StepError::InvalidTransition { .. })),
        "expected invalid transition error, got {:#}",
        err
    );
    let res = store.write(Phase::Finalize, Substep::SwapDataDirectories, Status::Running).await;
    assert!(res.is_err(), "expected complete -> running to be rejected");
    Ok(())
}

#[tokio::test]
async fn pending_can_not_complete_without_running() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = StatusStore::new(dir.path());

    let res = store.write(Phase::Initialize, Substep::StartHub, Status::Complete).await;
    assert!(res.is_err(), "expected pending -> complete to be rejected");
    assert!(store.entries().await?.is_empty(), "expected rejected transition not to be recorded");
    Ok(())
}

#[tokio::test]
async fn disabled_store_writes_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = StatusStore::new(dir.path());
    let handle = store.clone();

    handle.disable();
    store.write(Phase::Revert, Substep::DeleteStateDirectory, Status::Running).await?;

    assert!(store.is_disabled(), "expected clones to share the disabled flag");
    assert!(!store.path().exists(), "expected no status log to be written");
    Ok(())
}

#[test]
fn transition_table() {
    let allowed = [
        (Status::Pending, Status::Running),
        (Status::Running, Status::Complete),
        (Status::Running, Status::Failed),
        (Status::Running, Status::Skipped),
        (Status::Failed, Status::Running),
        (Status::Skipped, Status::Running),
    ];
    for (from, to) in allowed.iter() {
        assert!(from.can_transition_to(*to), "expected {} -> {} to be allowed", from, to);
    }
    let rejected = [
        (Status::Complete, Status::Pending),
        (Status::Complete, Status::Running),
        (Status::Complete, Status::Failed),
        (Status::Failed, Status::Complete),
        (Status::Running, Status::Pending),
    ];
    for (from, to) in rejected.iter() {
        assert!(!from.can_transition_to(*to), "expected {} -> {} to be rejected", from, to);
    }
}
