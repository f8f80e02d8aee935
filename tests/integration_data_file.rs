//! End-to-end tests over real header/data pairs written to temp directories.

use magda_flatfile::config::MagdaConfig;
use magda_flatfile::error::{ErrorCategory, MagdaError};
use magda_flatfile::models::TypeCode;
use magda_flatfile::time::{TimeScale, Timebase};
use magda_flatfile::DataFile;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Log sink shared between a test and its scoped subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

fn header_text(ncols: usize, nrows: usize, epoch: &str, columns: &[&str]) -> String {
    let mut lines = vec![
        "DATA  = generated for tests".to_string(),
        format!("NCOLS = {ncols:>10}"),
        format!("NROWS = {nrows:>10}"),
        "OPSYS = SUN/UNIX".to_string(),
        "# NAME      UNITS     SOURCE                  TYPE  LOC".to_string(),
    ];
    lines.extend(columns.iter().map(|c| c.to_string()));
    lines.push("ABSTRACT".to_string());
    lines.push("Magnetometer data reduced to the requested coordinate frame.".to_string());
    lines.push(format!("EPOCH = {epoch}"));
    lines.push("FIRST TIME = 2017 051 Feb 20 00:00:00.000".to_string());
    lines.push("LAST TIME  = 2017 051 Feb 20 23:59:00.000".to_string());
    lines.iter().map(|l| format!("{l:<72}")).collect()
}

const KSM_COLUMNS: &[&str] = &[
    "001 TIME      SEC       SCLK                    T     0",
    "002 BX_KSM    nT        MAG                     R     8",
    "003 BY_KSM    nT        MAG                     R    12",
    "004 BZ_KSM    nT        MAG                     R    16",
];

fn ksm_rows(n: usize) -> Vec<u8> {
    (0..n)
        .flat_map(|i| {
            let mut row = (i as f64 * 60.0).to_be_bytes().to_vec();
            for component in 0..3 {
                row.extend_from_slice(&((i * 3 + component) as f32).to_be_bytes());
            }
            row
        })
        .collect()
}

fn write_pair(dir: &Path, stem: &str, header: &str, data: &[u8]) -> PathBuf {
    std::fs::write(dir.join(format!("{stem}.ffh")), header).unwrap();
    let data_path = dir.join(format!("{stem}.ffd"));
    std::fs::write(&data_path, data).unwrap();
    data_path
}

#[test]
fn test_declared_rows_are_corrected() {
    let temp_dir = TempDir::new().unwrap();
    let header = header_text(4, 100, "J2000", KSM_COLUMNS);
    let path = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_ksm_1m", &header, &ksm_rows(80));

    let (file, logs) = with_captured_logs(|| DataFile::open(&path));
    let file = file.unwrap();
    assert_eq!(file.n_rows(), 80);
    assert_eq!(file.declared_row_count(), 100);
    assert!(file.row_count_mismatch());
    for column in file.columns() {
        assert_eq!(column.len(), 80);
    }

    assert!(logs.contains("WARN"), "no warning logged: {logs}");
    assert!(logs.contains("contains 80 rows but its header declares 100"));
}

#[test]
fn test_matching_row_count_logs_no_warning() {
    let temp_dir = TempDir::new().unwrap();
    let header = header_text(4, 5, "J2000", KSM_COLUMNS);
    let path = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_ksm_1m", &header, &ksm_rows(5));

    let (file, logs) = with_captured_logs(|| DataFile::open(&path));
    assert!(!file.unwrap().row_count_mismatch());
    assert!(logs.is_empty(), "unexpected warnings: {logs}");
}

#[test]
fn test_misaligned_data_fails() {
    let temp_dir = TempDir::new().unwrap();
    let header = header_text(4, 2, "J2000", KSM_COLUMNS);
    let mut data = ksm_rows(2);
    data.truncate(data.len() - 3);
    let path = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_ksm_1m", &header, &data);

    let err = DataFile::open(&path).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Alignment);
    assert!(matches!(
        err,
        MagdaError::MisalignedData {
            byte_len: 37,
            row_width: 20,
            ..
        }
    ));
}

#[test]
fn test_schema_and_attributes() {
    let temp_dir = TempDir::new().unwrap();
    let header = header_text(4, 3, "J2000", KSM_COLUMNS);
    let path = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_ksm_1m", &header, &ksm_rows(3));

    let file = DataFile::open(&path).unwrap();
    assert_eq!(file.telemetry(), "SD");
    assert_eq!(file.sensor(), "FGM");
    assert_eq!(file.coordinate_frame(), "KSM");
    assert_eq!(file.resolution(), "1m");

    let indices: Vec<_> = file.columns().iter().map(|c| c.definition.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(file.columns()[0].definition.type_code, TypeCode::Time);

    // geometry consumers look columns up by name and rely on equal lengths
    let names = ["TIME", "BX_KSM", "BY_KSM", "BZ_KSM"];
    let lengths: Vec<_> = names.iter().map(|n| file.column(n).unwrap().len()).collect();
    assert_eq!(lengths, vec![3, 3, 3, 3]);
    assert_eq!(
        file.column("BZ_KSM").unwrap().values.as_f32().unwrap(),
        &[2.0, 5.0, 8.0]
    );

    assert!(file.first_timestamp().is_some());
    assert!(file.last_timestamp().unwrap() > file.first_timestamp().unwrap());
}

#[test]
fn test_time_axis_round_trip_for_every_epoch() {
    for epoch in ["J2000", "Y1958", "Y1966"] {
        let temp_dir = TempDir::new().unwrap();
        let header = header_text(4, 3, epoch, KSM_COLUMNS);
        let mut data = ksm_rows(3);
        // first relative time 12.25 s
        data[..8].copy_from_slice(&12.25f64.to_be_bytes());
        let path = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_ksm_1m", &header, &data);

        let file = DataFile::open(&path).unwrap();
        let timebase = Timebase::from_epoch_key(epoch).unwrap();
        assert_eq!(file.timebase(), &timebase);
        assert_eq!(timebase.scale(), TimeScale::Utc);

        let times = file.time().unwrap();
        assert_eq!(times[0], timebase.at(12.25).unwrap());
        assert_eq!(times[1], timebase.at(60.0).unwrap());
    }
}

#[test]
fn test_nan_time_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    let header = header_text(4, 2, "J2000", KSM_COLUMNS);
    let mut data = ksm_rows(2);
    // rows are 20 bytes wide; row 1 starts with its time field
    data[20..28].copy_from_slice(&f64::NAN.to_be_bytes());
    let path = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_ksm_1m", &header, &data);

    let err = DataFile::open(&path).unwrap_err();
    assert!(matches!(err, MagdaError::InvalidTimeValue { row: 1, .. }));
    assert_eq!(err.category(), ErrorCategory::Format);
}

#[test]
fn test_c_frame_status_is_decoded() {
    let temp_dir = TempDir::new().unwrap();
    let columns = [
        "001 TIME      SEC       SCLK                    T     0",
        "002 BX        nT        MAG                     R     8",
        "003 FGMStatus DN        MAG status              I    12",
    ];
    let header = header_text(3, 3, "J2000", &columns);
    let raw = [-1_879_046_909i32, 268_436_995, 1_073_742_851];
    let data: Vec<u8> = raw
        .iter()
        .enumerate()
        .flat_map(|(i, status)| {
            let mut row = (i as f64).to_be_bytes().to_vec();
            row.extend_from_slice(&0.5f32.to_be_bytes());
            row.extend_from_slice(&status.to_be_bytes());
            row
        })
        .collect();

    let c_path = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_c_1s", &header, &data);
    let file = DataFile::open(&c_path).unwrap();
    assert_eq!(
        file.column("FGMStatus").unwrap().values.as_i32().unwrap(),
        &[2, 0, 1]
    );

    // the same bytes in another frame stay raw
    let krtp_path = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_krtp_1s", &header, &data);
    let file = DataFile::open(&krtp_path).unwrap();
    assert_eq!(
        file.column("FGMStatus").unwrap().values.as_i32().unwrap(),
        &raw
    );
}

#[test]
fn test_unknown_epoch_is_a_lookup_error() {
    let temp_dir = TempDir::new().unwrap();
    let header = header_text(4, 1, "B1950", KSM_COLUMNS);
    let path = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_ksm_1m", &header, &ksm_rows(1));

    let err = DataFile::open(&path).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Lookup);
}

#[test]
fn test_unrecognized_file_name_fails() {
    let temp_dir = TempDir::new().unwrap();
    let header = header_text(4, 1, "J2000", KSM_COLUMNS);
    let path = write_pair(temp_dir.path(), "magnetometer_day51", &header, &ksm_rows(1));

    let err = DataFile::open(&path).unwrap_err();
    assert!(matches!(err, MagdaError::InvalidFileName { .. }));
}

#[test]
fn test_data_root_layout() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("cassini");
    let day = root.join("y17").join("17051").join("processed");
    std::fs::create_dir_all(&day).unwrap();
    let header = header_text(4, 2, "J2000", KSM_COLUMNS);
    let path = write_pair(&day, "17051_mrdcd_sdfgmc_ksm_1m", &header, &ksm_rows(2));

    let config = MagdaConfig::default().with_data_root(&root);
    let file = DataFile::open_with_config(&path, None, &config).unwrap();
    assert_eq!(file.n_rows(), 2);

    // outside the archive layout the same pair is rejected
    let stray = write_pair(temp_dir.path(), "17051_mrdcd_sdfgmc_ksm_1m", &header, &ksm_rows(2));
    let err = DataFile::open_with_config(&stray, None, &config).unwrap_err();
    assert!(matches!(err, MagdaError::InvalidFileName { .. }));
}

#[test]
fn test_missing_data_file() {
    let temp_dir = TempDir::new().unwrap();
    let header = header_text(4, 1, "J2000", KSM_COLUMNS);
    std::fs::write(temp_dir.path().join("17051_mrdcd_sdfgmc_ksm_1m.ffh"), header).unwrap();

    let err = DataFile::open(temp_dir.path().join("17051_mrdcd_sdfgmc_ksm_1m.ffd")).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Io);
}
