use anyhow::{bail, Result};

use crate::dirs::{check_disk_space, parse_df, DiskUsage};

#[test]
fn df_output_yields_size_and_available_space() -> Result<()> {
    let output = "Filesystem     1024-blocks     Used Available Capacity Mounted on\n\
                  /dev/sdb1        104857600 62914560  41943040      61% /data\n";

    let usage = parse_df(output)?;

    assert!(
        usage == DiskUsage { total_kb: 104857600, available_kb: 41943040 },
        "unexpected usage {:?}",
        usage
    );
    assert!((usage.free_ratio() - 0.4).abs() < 1e-9, "expected 40% free, got {}", usage.free_ratio());
    Ok(())
}

#[test]
fn df_output_without_a_filesystem_is_rejected() {
    let outputs = ["Filesystem 1024-blocks Used Available Capacity Mounted on\n", "", "header\n/dev/sdb1 lots\n"];
    for output in outputs.iter() {
        assert!(parse_df(output).is_err(), "expected {:?} to be rejected", output);
    }
}

#[tokio::test]
async fn zero_ratio_skips_the_disk_check() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("not-measured");

    check_disk_space(&missing, 0.0).await?;
    match check_disk_space(&missing, 0.5).await {
        Ok(()) => bail!("expected a missing directory to fail a real check"),
        Err(_) => Ok(()),
    }
}
