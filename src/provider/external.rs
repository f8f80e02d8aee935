//! Header provider backed by an out-of-process tool.
//!
//! The tool is run as `<program> <args...> <header-path>` and must print
//! `key=value` lines on stdout. A non-zero exit surfaces its stderr
//! verbatim; a tool that outlives its timeout is killed.

use super::{HeaderMetadataProvider, last_modified};
use crate::attributes::NameAttributeExtractor;
use crate::config::ExternalToolConfig;
use crate::constants::EXTRA_TOOL_COLUMN_FRAME;
use crate::error::{MagdaError, Result};
use crate::header::parse_header_time;
use crate::models::{ColumnDefinition, FileAttributes, HeaderMetadata, TypeCode};
use crate::time::{TimeScale, Timebase};
use chrono::NaiveDateTime;
use std::path::Path;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

/// Fields reported by one tool invocation, in no particular order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ToolOutput {
    pub timebase: Option<Timebase>,
    pub columns: Vec<ColumnDefinition>,
    pub attributes: Option<FileAttributes>,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub row_count: Option<usize>,
}

fn java_type_code(class: &str) -> Option<TypeCode> {
    match class.trim() {
        "class java.lang.Double" => Some(TypeCode::Time),
        "class java.lang.Float" => Some(TypeCode::Real),
        "class java.lang.Integer" => Some(TypeCode::Integer),
        _ => None,
    }
}

/// Parse the tool's `key=value` stream.
///
/// `column<N>` values are `name,source,units,<java class>` with `N` already
/// 0-based; `timebase` is integer milliseconds on the TAI scale. Unknown keys
/// are skipped.
pub fn parse_tool_output(stdout: &str, extractor: &NameAttributeExtractor) -> Result<ToolOutput> {
    let mut output = ToolOutput::default();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| MagdaError::malformed_output(line, "expected key=value"))?;
        let (key, value) = (key.trim(), value.trim());

        match key {
            "timebase" => {
                let millis = value
                    .parse::<i64>()
                    .map_err(|_| MagdaError::malformed_output(line, "timebase is not an integer"))?;
                let timebase = Timebase::from_unix_millis(millis, TimeScale::Tai)
                    .ok_or_else(|| MagdaError::malformed_output(line, "timebase out of range"))?;
                output.timebase = Some(timebase);
            }
            "attrs" => output.attributes = Some(extractor.extract_from_name(value)?),
            "start" => output.first_timestamp = Some(parse_header_time(value)?),
            "end" => output.last_timestamp = Some(parse_header_time(value)?),
            "n_rows" => {
                let rows = value
                    .parse::<usize>()
                    .map_err(|_| MagdaError::malformed_output(line, "n_rows is not a count"))?;
                output.row_count = Some(rows);
            }
            _ if key.starts_with("column") => output.columns.push(parse_column(line, key, value)?),
            _ => trace!("Ignoring header tool key {}", key),
        }
    }

    Ok(output)
}

fn parse_column(line: &str, key: &str, value: &str) -> Result<ColumnDefinition> {
    let index = key["column".len()..]
        .parse::<usize>()
        .map_err(|_| MagdaError::malformed_output(line, "column key has no index"))?;

    let fields: Vec<&str> = value.split(',').collect();
    let [name, source, units, class] = fields.as_slice() else {
        return Err(MagdaError::malformed_output(
            line,
            "expected name,source,units,type",
        ));
    };
    let type_code = java_type_code(class)
        .ok_or_else(|| MagdaError::malformed_output(line, "unknown column type"))?;

    Ok(ColumnDefinition::new(
        index,
        name.trim(),
        units.trim(),
        source.trim(),
        type_code,
    ))
}

/// Runs an external header tool per request
#[derive(Debug, Clone)]
pub struct ExternalHeaderProvider {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    extractor: NameAttributeExtractor,
    data_extension: String,
}

impl ExternalHeaderProvider {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        data_extension: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            extractor: NameAttributeExtractor::unrooted(),
            data_extension: data_extension.into(),
        }
    }

    pub fn from_config(tool: &ExternalToolConfig, data_extension: &str) -> Self {
        Self::new(
            tool.program.clone(),
            tool.args.clone(),
            tool.timeout(),
            data_extension,
        )
    }

    /// Run the tool to completion on a private current-thread runtime.
    /// A thread already driving a tokio runtime cannot block on another
    /// one, so callers inside async code get the run on a scoped thread.
    fn run_tool(&self, header_path: &Path) -> Result<String> {
        if tokio::runtime::Handle::try_current().is_err() {
            return self.run_tool_blocking(header_path);
        }

        debug!("Header tool requested from inside a tokio runtime; using a scoped thread");
        thread::scope(|scope| {
            match scope.spawn(|| self.run_tool_blocking(header_path)).join() {
                Ok(result) => result,
                Err(_) => Err(MagdaError::configuration(format!(
                    "header tool thread for {} panicked",
                    header_path.display()
                ))),
            }
        })
    }

    fn run_tool_blocking(&self, header_path: &Path) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| MagdaError::ToolLaunch {
                program: self.program.clone(),
                source,
            })?;
        runtime.block_on(self.run_tool_async(header_path))
    }

    async fn run_tool_async(&self, header_path: &Path) -> Result<String> {
        debug!(
            "Running header tool: {} {:?} {}",
            self.program,
            self.args,
            header_path.display()
        );

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(header_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MagdaError::ToolLaunch {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| MagdaError::ToolTimeout {
                program: self.program.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| MagdaError::ToolLaunch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MagdaError::Communication {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl HeaderMetadataProvider for ExternalHeaderProvider {
    fn header_metadata(&self, header_path: &Path) -> Result<HeaderMetadata> {
        let stdout = self.run_tool(header_path)?;
        let output = parse_tool_output(&stdout, &self.extractor)?;
        into_metadata(output, header_path, &self.data_extension)
    }
}

fn into_metadata(
    output: ToolOutput,
    header_path: &Path,
    data_extension: &str,
) -> Result<HeaderMetadata> {
    let timebase = output.timebase.ok_or_else(|| MagdaError::MissingEpoch {
        path: header_path.to_path_buf(),
    })?;
    let attributes = output
        .attributes
        .ok_or_else(|| MagdaError::MissingHeaderField {
            path: header_path.to_path_buf(),
            field: "attrs",
        })?;
    let row_count = output.row_count.ok_or_else(|| MagdaError::MissingHeaderField {
        path: header_path.to_path_buf(),
        field: "n_rows",
    })?;

    let mut columns = output.columns;
    columns.sort_by_key(|c| c.index);

    // The tool appends a BTotal column that C-frame data files never hold
    if attributes.coordinate_frame == EXTRA_TOOL_COLUMN_FRAME {
        if let Some(dropped) = columns.pop() {
            debug!("Dropping tool-appended column {} for frame C", dropped.name);
        }
    }

    if let Some(reason) = HeaderMetadata::schema_violation(&columns) {
        return Err(MagdaError::invalid_schema(header_path, reason));
    }

    Ok(HeaderMetadata {
        header_path: header_path.to_path_buf(),
        columns,
        row_count,
        timebase,
        attributes,
        first_timestamp: output.first_timestamp,
        last_timestamp: output.last_timestamp,
        last_modified: last_modified(header_path, data_extension)?,
    })
}
