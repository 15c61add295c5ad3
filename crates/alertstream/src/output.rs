use std::io::IsTerminal;

use alertstream_event::AttendanceRecord;
use alertstream_session::{NotifyError, RecordSink};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_record(record: &AttendanceRecord, format: OutputFormat) {
    println!("{}", render_record(record, format));
}

fn render_record(record: &AttendanceRecord, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIMESTAMP", "NAME", "EMPLOYEE NO", "STATUS"])
                .add_row(vec![
                    record.timestamp.as_str(),
                    record.name.as_str(),
                    record.employee_no.as_str(),
                    record.status.as_str(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "{} name={} employee_no={} status={}",
            record.timestamp, record.name, record.employee_no, record.status
        ),
    }
}

/// Prints every record to stdout before handing it to the inner sink.
pub struct PrintingSink<S> {
    inner: S,
    format: OutputFormat,
}

impl<S> PrintingSink<S> {
    pub fn new(inner: S, format: OutputFormat) -> Self {
        Self { inner, format }
    }
}

impl<S: RecordSink> RecordSink for PrintingSink<S> {
    async fn deliver(&self, record: &AttendanceRecord) -> Result<(), NotifyError> {
        print_record(record, self.format);
        self.inner.deliver(record).await
    }
}
