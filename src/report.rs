//! HTML statistics report for a cache pool
//!
//! [`render_report`] turns the per-server `stats` maps from
//! [`CacheStore::statistics`](crate::store::CacheStore::statistics) into a
//! self-contained HTML fragment. With more than one server an accumulative section
//! comes first; every server then gets its own section tagged with a letter
//! (A..Z, AA, AB, ...).

use std::collections::BTreeMap;

use chrono::DateTime;

use crate::store::ServerStats;

/// Available memory below this many bytes is flagged
pub const LOW_MEMORY_WARNING_BYTES: u64 = 1024;

const COLOR_TITLE: &str = "4D89F9";
const COLOR_BORDER: &str = "E4EDFD";
const COLOR_HEADER: &str = "C6D9FD";
const COLOR_SECTION: &str = "E4EDFD";
const COLOR_ROW: [&str; 2] = ["FFF", "F7F7F7"];
const COLOR_LABEL: &str = "555";
const COLOR_VALUE: &str = "7E94BE";
const COLOR_ERROR: &str = "990000";

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;
const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_WEEK: u64 = 7 * SECONDS_PER_DAY;
/// 52.177457 weeks
const SECONDS_PER_YEAR: u64 = 31_556_926;

/// Totals across every server in a pool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub servers: usize,
    pub accepting_conns: usize,
    pub bytes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub limit_maxbytes: u64,
    pub rusage_user: f64,
    pub rusage_system: f64,
    pub threads: u64,
    pub curr_connections: u64,
    pub total_connections: u64,
    pub connection_structures: u64,
    pub conn_yields: u64,
    pub listen_disabled_num: u64,
    pub evictions: u64,
    pub cmd_flush: u64,
    pub cmd_get: u64,
    pub cmd_set: u64,
    pub cas_badval: u64,
    pub cas_hits: u64,
    pub cas_misses: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub delete_hits: u64,
    pub delete_misses: u64,
    pub incr_hits: u64,
    pub incr_misses: u64,
    pub decr_hits: u64,
    pub decr_misses: u64,
    pub curr_items: u64,
    pub total_items: u64,
}

impl StatsSummary {
    pub fn from_stats<'a>(stats: impl IntoIterator<Item = &'a ServerStats>) -> Self {
        let mut summary = StatsSummary::default();
        for s in stats {
            summary.servers += 1;
            if s.accepting_conns {
                summary.accepting_conns += 1;
            }
            summary.bytes += s.bytes;
            summary.bytes_read += s.bytes_read;
            summary.bytes_written += s.bytes_written;
            summary.limit_maxbytes += s.limit_maxbytes;
            summary.rusage_user += s.rusage_user;
            summary.rusage_system += s.rusage_system;
            summary.threads += s.threads as u64;
            summary.curr_connections += s.curr_connections;
            summary.total_connections += s.total_connections;
            summary.connection_structures += s.connection_structures;
            summary.conn_yields += s.conn_yields;
            summary.listen_disabled_num += s.listen_disabled_num;
            summary.evictions += s.evictions;
            summary.cmd_flush += s.cmd_flush;
            summary.cmd_get += s.cmd_get;
            summary.cmd_set += s.cmd_set;
            summary.cas_badval += s.cas_badval;
            summary.cas_hits += s.cas_hits;
            summary.cas_misses += s.cas_misses;
            summary.get_hits += s.get_hits;
            summary.get_misses += s.get_misses;
            summary.delete_hits += s.delete_hits;
            summary.delete_misses += s.delete_misses;
            summary.incr_hits += s.incr_hits;
            summary.incr_misses += s.incr_misses;
            summary.decr_hits += s.decr_hits;
            summary.decr_misses += s.decr_misses;
            summary.curr_items += s.curr_items;
            summary.total_items += s.total_items;
        }
        summary
    }

    pub fn memory_available(&self) -> u64 {
        self.limit_maxbytes.saturating_sub(self.bytes)
    }

    /// Percentage of allocated memory in use, 0.0 when nothing is allocated
    pub fn used_percent(&self) -> f64 {
        if self.limit_maxbytes == 0 {
            return 0.0;
        }
        self.bytes as f64 / self.limit_maxbytes as f64 * 100.0
    }
}

/// Human-readable byte count: `512 B`, `1.50 KB`, `64.00 MB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// Uptime as `1 year, 2 weeks, 3 days, 4 hours and 5 minutes`
///
/// Zero components are left out except minutes, which always close the string.
pub fn format_duration(seconds: u64) -> String {
    let years = seconds / SECONDS_PER_YEAR;
    let mut rem = seconds % SECONDS_PER_YEAR;
    let weeks = rem / SECONDS_PER_WEEK;
    rem %= SECONDS_PER_WEEK;
    let days = rem / SECONDS_PER_DAY;
    rem %= SECONDS_PER_DAY;
    let hours = rem / SECONDS_PER_HOUR;
    rem %= SECONDS_PER_HOUR;
    let minutes = rem / SECONDS_PER_MINUTE;

    let mut parts: Vec<String> = [(years, "year"), (weeks, "week"), (days, "day"), (hours, "hour")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| plural(n, unit))
        .collect();
    let minutes = plural(minutes, "minute");

    match parts.pop() {
        None => minutes,
        Some(last) if parts.is_empty() => format!("{} and {}", last, minutes),
        Some(last) => format!("{}, {} and {}", parts.join(", "), last, minutes),
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Count with thousands separators: `1,234,567`
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Escape text for HTML element content and single- or double-quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Spreadsheet-style marker: 0 → A, 25 → Z, 26 → AA
pub fn server_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

fn issue(text: String) -> String {
    format!("<span class='issue' style='color:#{}'>{} !</span>", COLOR_ERROR, text)
}

fn count_or_issue(n: u64) -> String {
    if n > 0 {
        issue(format_count(n))
    } else {
        format_count(n)
    }
}

fn available_or_issue(available: u64) -> String {
    if available < LOW_MEMORY_WARNING_BYTES {
        issue(format_bytes(available))
    } else {
        format_bytes(available)
    }
}

fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%B %-d, %Y %-I:%M:%S%p UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Splits `host:port` keys; unix socket paths keep their `unix://` host
fn split_server(name: &str) -> (&str, &str) {
    name.rsplit_once(':').unwrap_or((name, ""))
}

/// Accumulates table rows, alternating row shading
struct Table {
    html: String,
    rows: usize,
}

impl Table {
    fn new(margin_top: bool) -> Self {
        let margin = if margin_top { " margin-top: 10px;" } else { "" };
        Self {
            html: format!(
                "<table class='memcachereport' style='font-size: 12px; width: 100%;{} border: 1px solid #{};' cellpadding='0' cellspacing='0'>\n",
                margin, COLOR_BORDER
            ),
            rows: 0,
        }
    }

    fn header(&mut self, html: &str) {
        self.html.push_str(&format!(
            "<tr><td colspan='2' style='font-size: 14px; background-color: #{}; padding: 5px;'><b>{}</b></td></tr>\n",
            COLOR_HEADER, html
        ));
    }

    fn section(&mut self, title: &str) {
        self.rows = 0;
        self.html.push_str(&format!(
            "<tr><td colspan='2' style='font-size: 12px; background-color: #{}; padding: 5px;'><b>{}</b></td></tr>\n",
            COLOR_SECTION, title
        ));
    }

    /// `value` is inserted as HTML; callers escape untrusted text
    fn row(&mut self, label: &str, hint: &str, value: &str) {
        let shade = COLOR_ROW[self.rows % 2];
        self.rows += 1;
        self.html.push_str(&format!(
            "<tr style='background-color: #{}' title='{}'><td height='20' width='175' align='right' style='color:#{}'>{} &nbsp;&rsaquo;&nbsp;</td><td style='color:#{}'>&nbsp;{}</td></tr>\n",
            shade, hint, COLOR_LABEL, label, COLOR_VALUE, value
        ));
    }

    fn finish(mut self) -> String {
        self.html.push_str("</table>\n");
        self.html
    }
}

fn memory_rows(table: &mut Table, limit: u64, bytes: u64, bytes_read: u64, bytes_written: u64) {
    table.section("Memory Usage");
    table.row(
        "Memory Allocation",
        "Number of bytes the server is allowed to use for storage.",
        &format_bytes(limit),
    );
    table.row(
        "Memory In Use",
        "Current number of bytes used to store items.",
        &format_bytes(bytes),
    );
    table.row(
        "Memory Available",
        "Current number of bytes available to store items.",
        &available_or_issue(limit.saturating_sub(bytes)),
    );
    table.row(
        "Total Read Memory",
        "Total number of bytes read from the network.",
        &format_bytes(bytes_read),
    );
    table.row(
        "Total Written Memory",
        "Total number of bytes sent to the network.",
        &format_bytes(bytes_written),
    );
}

fn cache_rows(table: &mut Table, s: &StatsSummary) {
    table.section("Cache Statistics");
    table.row(
        "Listeners Disabled",
        "Times socket listeners were disabled at the connection limit.",
        &format_count(s.listen_disabled_num),
    );
    table.row(
        "Evictions",
        "Valid items removed to free memory for new items.",
        &count_or_issue(s.evictions),
    );
    table.row("Flush Commands", "Total flush requests.", &format_count(s.cmd_flush));
    table.row("Get Commands", "Total retrieval requests.", &format_count(s.cmd_get));
    table.row("Set Commands", "Total storage requests.", &format_count(s.cmd_set));
    table.row(
        "CAS Bad Value",
        "Compare-and-swap requests whose comparison value did not match.",
        &format_count(s.cas_badval),
    );
    table.row("CAS Hits", "Compare-and-swap requests on present keys.", &format_count(s.cas_hits));
    table.row(
        "CAS Misses",
        "Compare-and-swap requests on missing keys.",
        &count_or_issue(s.cas_misses),
    );
    table.row("Get Hits", "Keys requested and found.", &format_count(s.get_hits));
    table.row("Get Misses", "Keys requested and not found.", &count_or_issue(s.get_misses));
    table.row("Delete Hits", "Keys deleted and found.", &format_count(s.delete_hits));
    table.row(
        "Delete Misses",
        "Keys deleted and not found.",
        &count_or_issue(s.delete_misses),
    );
    table.row("Increment Hits", "Keys incremented and found.", &format_count(s.incr_hits));
    table.row(
        "Increment Misses",
        "Keys incremented and not found.",
        &count_or_issue(s.incr_misses),
    );
    table.row("Decrement Hits", "Keys decremented and found.", &format_count(s.decr_hits));
    table.row(
        "Decrement Misses",
        "Keys decremented and not found.",
        &count_or_issue(s.decr_misses),
    );
}

fn connection_rows(table: &mut Table, s: &StatsSummary) {
    table.section("Connection Information");
    table.row(
        "Current Connections",
        "Currently open connections.",
        &format_count(s.curr_connections),
    );
    table.row(
        "Total Connections",
        "Connections opened since the server started.",
        &format_count(s.total_connections),
    );
    table.row("Connection Yields", "Yields for connections.", &format_count(s.conn_yields));
    table.row(
        "Connection Structures",
        "Connection structures allocated by the server.",
        &format_count(s.connection_structures),
    );
}

fn item_rows(table: &mut Table, s: &StatsSummary) {
    table.section("Item Information");
    table.row("Current Items", "Items currently stored.", &format_count(s.curr_items));
    table.row(
        "Total Items",
        "Items stored during the life of the server.",
        &format_count(s.total_items),
    );
}

fn accumulative_table(summary: &StatsSummary) -> String {
    let mut table = Table::new(false);
    table.header("Accumulative Memcache Report");

    table.section("Server Statistics");
    table.row(
        "System CPU Usage",
        "Total system time across servers.",
        &format!("{:.6} Seconds", summary.rusage_system),
    );
    table.row(
        "User CPU Usage",
        "Total user time across servers.",
        &format!("{:.6} Seconds", summary.rusage_user),
    );

    memory_rows(
        &mut table,
        summary.limit_maxbytes,
        summary.bytes,
        summary.bytes_read,
        summary.bytes_written,
    );
    connection_rows(&mut table, summary);
    cache_rows(&mut table, summary);
    item_rows(&mut table, summary);
    table.finish()
}

fn server_table(name: &str, letter: Option<String>, stats: &ServerStats, now: u64) -> String {
    let (host, port) = split_server(name);
    let marker = letter
        .map(|l| format!("[ {} ]&nbsp; ", l))
        .unwrap_or_default();

    let mut table = Table::new(true);
    table.header(&format!(
        "{}{} &nbsp; &nbsp;&rsaquo;&nbsp; {}",
        marker,
        escape_html(host),
        escape_html(port)
    ));

    // Backends that do not report `time` get the caller's clock
    let server_now = if stats.time > 0 { stats.time } else { now };
    let started = server_now.saturating_sub(stats.uptime);

    table.section("Server Statistics");
    table.row(
        "Accepting Connections",
        "Whether the server is currently accepting connections.",
        if stats.accepting_conns { "Yes" } else { "No" },
    );
    table.row("Memcache Version", "Version string of this instance.", &escape_html(&stats.version));
    table.row("Process ID", "Process id of this instance.", &stats.pid.to_string());
    table.row(
        "Pointer Size",
        "Size of pointers on this host in bits.",
        &stats.pointer_size.to_string(),
    );
    table.row("Threads", "Worker threads requested.", &stats.threads.to_string());
    table.row(
        "System CPU Usage",
        "Total system time for this instance.",
        &format!("{:.6} Seconds", stats.rusage_system),
    );
    table.row(
        "User CPU Usage",
        "Total user time for this instance.",
        &format!("{:.6} Seconds", stats.rusage_user),
    );
    table.row("Start Time", "When this instance started.", &format_timestamp(started));
    table.row("Uptime", "How long this instance has been up.", &format_duration(stats.uptime));

    memory_rows(
        &mut table,
        stats.limit_maxbytes,
        stats.bytes,
        stats.bytes_read,
        stats.bytes_written,
    );

    let single = StatsSummary::from_stats([stats]);
    connection_rows(&mut table, &single);
    cache_rows(&mut table, &single);
    item_rows(&mut table, &single);
    table.finish()
}

/// Render the pool report as an HTML fragment
///
/// `now` is the current Unix time, used for the generation stamp and for servers
/// that do not report their own clock.
pub fn render_report(stats: &BTreeMap<String, ServerStats>, now: u64) -> String {
    let summary = StatsSummary::from_stats(stats.values());
    let noun = if summary.servers == 1 {
        "Connection"
    } else {
        "Connections"
    };

    let mut html = String::new();
    html.push_str("<div id='memcachereport' style='font-family: arial; margin: 0 auto;'>\n");
    html.push_str(&format!(
        "<h3 style='font-size: 16px; color: #{}; white-space: nowrap;'>Memcache Report &nbsp;&rsaquo;&nbsp; {} Server {}</h3>\n",
        COLOR_TITLE, summary.servers, noun
    ));
    html.push_str(&format!(
        "<p style='font-size: 11px; color: #{}'>Generated {} &nbsp;&middot;&nbsp; {} of {} in use ({:.2}%)</p>\n",
        COLOR_LABEL,
        format_timestamp(now),
        format_bytes(summary.bytes),
        format_bytes(summary.limit_maxbytes),
        summary.used_percent()
    ));

    if summary.servers > 1 {
        html.push_str(&accumulative_table(&summary));
    }

    let lettered = summary.servers > 1;
    for (index, (name, server)) in stats.iter().enumerate() {
        let letter = lettered.then(|| server_letter(index));
        html.push_str(&server_table(name, letter, server, now));
    }

    html.push_str("</div>\n");
    html
}
