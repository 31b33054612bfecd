//! Host metrics (`lh.*` on this machine, `rh.*` over ssh). Everything is read
//! through shell commands so both hosts share one implementation.

use std::sync::Arc;

use crate::task::{Decor, Draw, GAUGE_HEIGHT, RenderTask, TABLE_HEIGHT, TEXT_HEIGHT, TableData};
use crate::types::{Options, ServiceKind, Widget};
use crate::units::{convert_bin_unit, format_size, round};

use super::runner::CommandRunner;
use super::{ServiceError, WidgetContext, headers, row_limit, unsupported, widget_key};

const UPTIME: &str = "cat /proc/uptime";
const LOADAVG: &str = "cat /proc/loadavg";
const MEMINFO: &str = "cat /proc/meminfo";
const PROCESSES: &str = "ps -e --no-headers | wc -l";
const CPU_SAMPLES: &str = "head -n1 /proc/stat; sleep 1; head -n1 /proc/stat";
const DISK: &str = "df -k -P";

pub struct HostService {
    runner: Arc<dyn CommandRunner>,
}

/// Memory figures in kB, as /proc/meminfo reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Memory {
    pub total: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_free: u64,
}

impl Memory {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    pub fn swap_used(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_free)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub filesystem: String,
    pub size_kb: u64,
    pub used_kb: u64,
    pub available_kb: u64,
    pub capacity: String,
    pub mount: String,
}

impl HostService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn service(widget: &Widget) -> ServiceKind {
        widget
            .name
            .route()
            .map(|r| r.service)
            .unwrap_or(ServiceKind::LocalHost)
    }

    fn memory(&self) -> Result<Memory, ServiceError> {
        parse_meminfo(&self.runner.run(MEMINFO)?).ok_or_else(|| ServiceError::Output {
            command: MEMINFO.to_string(),
            reason: "missing MemTotal or MemAvailable".to_string(),
        })
    }
}

impl super::Service for HostService {
    fn create_widget(
        &self,
        widget: &Widget,
        options: &Options,
        _ctx: &WidgetContext,
    ) -> Result<RenderTask, ServiceError> {
        let name = widget.name.as_str();
        let (title, height, draw) = match widget_key(widget) {
            "box_uptime" => {
                let seconds = parse_uptime(&self.runner.run(UPTIME)?).ok_or_else(|| {
                    ServiceError::Output {
                        command: UPTIME.to_string(),
                        reason: "no uptime value".to_string(),
                    }
                })?;
                ("Uptime", TEXT_HEIGHT, Draw::Text(format_uptime(seconds)))
            }
            "box_load" => {
                let out = self.runner.run(LOADAVG)?;
                let load: Vec<&str> = out.split_whitespace().take(3).collect();
                ("Load average", TEXT_HEIGHT, Draw::Text(load.join(" ")))
            }
            "box_processes" => {
                let out = self.runner.run(PROCESSES)?;
                ("Processes", TEXT_HEIGHT, Draw::Text(out.trim().to_string()))
            }
            "box_memory" => {
                let memory = self.memory()?;
                let unit = options.get_or("unit", "gb");
                let used = convert_bin_unit(memory.used() as f64, "kb", unit);
                let total = convert_bin_unit(memory.total as f64, "kb", unit);
                let text = format!("{} / {}", format_size(used, unit), format_size(total, unit));
                ("Memory", TEXT_HEIGHT, Draw::Text(text))
            }
            "gauge_memory_rate" => {
                let memory = self.memory()?;
                ("Memory", GAUGE_HEIGHT, gauge(ratio(memory.used(), memory.total)))
            }
            "gauge_swap_rate" => {
                let memory = self.memory()?;
                ("Swap", GAUGE_HEIGHT, gauge(ratio(memory.swap_used(), memory.swap_total)))
            }
            "gauge_cpu_rate" => {
                let out = self.runner.run(CPU_SAMPLES)?;
                let rate = cpu_rate(&out).ok_or_else(|| ServiceError::Output {
                    command: CPU_SAMPLES.to_string(),
                    reason: "expected two cpu lines".to_string(),
                })?;
                ("CPU", GAUGE_HEIGHT, gauge(rate))
            }
            "table_disk" => {
                let unit = options.get_or("unit", "gb");
                let disks = parse_df(&self.runner.run(DISK)?);
                let mut rows: Vec<Vec<String>> = disks
                    .into_iter()
                    .map(|d| {
                        vec![
                            d.filesystem,
                            format_size(convert_bin_unit(d.size_kb as f64, "kb", unit), unit),
                            format_size(convert_bin_unit(d.used_kb as f64, "kb", unit), unit),
                            format_size(convert_bin_unit(d.available_kb as f64, "kb", unit), unit),
                            d.capacity,
                            d.mount,
                        ]
                    })
                    .collect();
                rows.truncate(row_limit(options, usize::MAX)?);
                let data = TableData {
                    headers: headers(options, &["Filesystem", "Size", "Used", "Avail", "Use%", "Mounted on"]),
                    rows,
                };
                ("Disks", TABLE_HEIGHT, Draw::Table(data))
            }
            "box_command" => {
                let command = options.get("command").ok_or(ServiceError::MissingOption("command"))?;
                let out = self.runner.run(command)?;
                ("Command", TEXT_HEIGHT, Draw::Text(out.trim_end().to_string()))
            }
            "table_command" => {
                let command = options.get("command").ok_or(ServiceError::MissingOption("command"))?;
                let out = self.runner.run(command)?;
                let mut rows: Vec<Vec<String>> = out
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| l.split_whitespace().map(str::to_string).collect())
                    .collect();
                rows.truncate(row_limit(options, usize::MAX)?);
                let data = TableData {
                    headers: options.list(&["headers"]),
                    rows,
                };
                ("Command", TABLE_HEIGHT, Draw::Table(data))
            }
            _ => return Err(unsupported(Self::service(widget), widget)),
        };

        let decor = Decor::from_options(options, title, height)?;
        Ok(RenderTask::new(name, decor, draw))
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn gauge(rate: f64) -> Draw {
    let percent = round(rate * 100.0, 2).clamp(0.0, 100.0);
    Draw::Gauge {
        percent: round(percent, 0) as u16,
        label: format!("{}%", percent),
    }
}

/// First field of /proc/uptime, in seconds.
pub fn parse_uptime(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

pub fn format_uptime(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    match days {
        0 => format!("{:02}:{:02}", hours, minutes),
        1 => format!("1 day, {:02}:{:02}", hours, minutes),
        _ => format!("{} days, {:02}:{:02}", days, hours, minutes),
    }
}

pub fn parse_meminfo(raw: &str) -> Option<Memory> {
    let field = |name: &str| -> Option<u64> {
        raw.lines()
            .find(|l| l.starts_with(name) && l[name.len()..].starts_with(':'))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse().ok())
    };

    Some(Memory {
        total: field("MemTotal")?,
        available: field("MemAvailable")?,
        swap_total: field("SwapTotal").unwrap_or(0),
        swap_free: field("SwapFree").unwrap_or(0),
    })
}

/// Busy share between two `cpu` lines of /proc/stat.
pub fn cpu_rate(raw: &str) -> Option<f64> {
    let samples: Vec<(u64, u64)> = raw
        .lines()
        .filter(|l| l.starts_with("cpu "))
        .filter_map(|l| {
            let fields: Vec<u64> = l.split_whitespace().skip(1).filter_map(|v| v.parse().ok()).collect();
            let idle = fields.get(3)? + fields.get(4).copied().unwrap_or(0);
            Some((idle, fields.iter().sum()))
        })
        .collect();

    let [(idle_a, total_a), (idle_b, total_b)] = samples.as_slice() else {
        return None;
    };
    let total = total_b.saturating_sub(*total_a);
    if total == 0 {
        return Some(0.0);
    }
    let idle = idle_b.saturating_sub(*idle_a);
    Some(1.0 - ratio(idle, total).min(1.0))
}

/// `df -k -P` output, header skipped.
pub fn parse_df(raw: &str) -> Vec<Disk> {
    raw.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }
            Some(Disk {
                filesystem: fields[0].to_string(),
                size_kb: fields[1].parse().ok()?,
                used_kb: fields[2].parse().ok()?,
                available_kb: fields[3].parse().ok()?,
                capacity: fields[4].to_string(),
                mount: fields[5..].join(" "),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Service;
    use crate::services::runner::fake::FakeRunner;
    use crate::services::testing::context;

    const MEM: &str = "MemTotal:       16384000 kB\nMemFree:  1000 kB\nMemAvailable:    4096000 kB\nSwapTotal:  2048000 kB\nSwapFree:   1024000 kB\n";

    fn service(runner: FakeRunner) -> HostService {
        HostService::new(Arc::new(runner))
    }

    fn build(service: &HostService, widget: Widget) -> Result<RenderTask, ServiceError> {
        let options = widget.options.clone();
        service.create_widget(&widget, &options, &context())
    }

    #[test]
    fn parses_proc_files() {
        assert_eq!(parse_uptime("350735.47 234388.90\n"), Some(350735.47));
        assert_eq!(format_uptime(350735.47), "4 days, 01:25");
        assert_eq!(format_uptime(90_000.0), "1 day, 01:00");
        assert_eq!(format_uptime(59.0), "00:00");

        let memory = parse_meminfo(MEM).unwrap();
        assert_eq!(memory.used(), 12_288_000);
        assert_eq!(memory.swap_used(), 1_024_000);
        assert!(parse_meminfo("MemFree: 1 kB").is_none());
    }

    #[test]
    fn cpu_rate_compares_two_samples() {
        let raw = "cpu  100 0 100 700 100 0 0 0 0 0\ncpu  150 0 150 850 150 0 0 0 0 0\n";
        // busy delta 100 of total delta 300
        let rate = cpu_rate(raw).unwrap();
        assert!((rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(cpu_rate("cpu  1 2 3 4\n"), None);
        assert_eq!(cpu_rate("cpu  1 1 1 1\ncpu  1 1 1 1\n"), Some(0.0));
    }

    #[test]
    fn parses_df_with_spaces_in_mount_points() {
        let raw = "Filesystem 1024-blocks Used Available Capacity Mounted on\n\
                   /dev/sda1 10485760 5242880 5242880 50% /\n\
                   /dev/sdb1 2048 1024 1024 50% /media/usb stick\n";
        let disks = parse_df(raw);
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].size_kb, 10_485_760);
        assert_eq!(disks[1].mount, "/media/usb stick");
    }

    #[test]
    fn memory_box_converts_units() {
        let svc = service(FakeRunner::default().answer(MEMINFO, MEM));
        let task = build(&svc, Widget::new("lh.box_memory")).unwrap();
        assert_eq!(task.draw, Draw::Text("11.72 GB / 15.63 GB".to_string()));

        let task = build(&svc, Widget::new("lh.box_memory").with_option("unit", "mb")).unwrap();
        assert_eq!(task.draw, Draw::Text("12000 MB / 16000 MB".to_string()));
    }

    #[test]
    fn memory_gauge_rounds_percentages() {
        let svc = service(FakeRunner::default().answer(MEMINFO, MEM));
        let task = build(&svc, Widget::new("rh.gauge_memory_rate")).unwrap();
        assert_eq!(
            task.draw,
            Draw::Gauge {
                percent: 75,
                label: "75%".to_string()
            }
        );
        let swap = build(&svc, Widget::new("rh.gauge_swap_rate")).unwrap();
        assert_eq!(swap.decor.title, "Swap");
    }

    #[test]
    fn disk_table_honours_unit_and_row_limit() {
        let df = "Filesystem 1024-blocks Used Available Capacity Mounted on\n\
                  /dev/sda1 10485760 5242880 5242880 50% /\n\
                  /dev/sdb1 2048 1024 1024 50% /boot\n";
        let svc = service(FakeRunner::default().answer(DISK, df));
        let task = build(&svc, Widget::new("lh.table_disk").with_option("row_limit", "1")).unwrap();
        let Draw::Table(table) = task.draw else {
            panic!("expected a table");
        };
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][1], "10 GB");
        assert_eq!(table.headers[0], "Filesystem");
    }

    #[test]
    fn command_widgets_need_a_command() {
        let svc = service(FakeRunner::default().answer("who", "alice tty1\nbob pts/0\n"));
        let err = build(&svc, Widget::new("lh.box_command")).unwrap_err();
        assert!(matches!(err, ServiceError::MissingOption("command")));

        let task = build(
            &svc,
            Widget::new("lh.table_command")
                .with_option("command", "who")
                .with_option("headers", "User, Terminal"),
        )
        .unwrap();
        let Draw::Table(table) = task.draw else {
            panic!("expected a table");
        };
        assert_eq!(table.headers, vec!["User", "Terminal"]);
        assert_eq!(table.rows[1], vec!["bob", "pts/0"]);
    }

    #[test]
    fn command_failures_and_unknown_widgets_are_errors() {
        let svc = service(FakeRunner::default().fail(UPTIME, "connection refused"));
        let err = build(&svc, Widget::new("rh.box_uptime")).unwrap_err();
        assert!(err.to_string().contains("connection refused"));

        let err = build(&svc, Widget::new("rh.bar_temperature")).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::UnsupportedWidget { service: ServiceKind::RemoteHost, .. }
        ));
    }
}
