use std::sync::Arc;

use crate::task::{Decor, Draw, RenderTask, TABLE_HEIGHT, TEXT_HEIGHT, TableData};
use crate::types::{Options, ServiceKind, Widget};

use super::runner::{CommandRunner, shell_quote};
use super::{ServiceError, WidgetContext, headers, row_limit, truncate_chars, unsupported, widget_key};

const FIELD_SEPARATOR: char = '\u{1f}';

/// Repository facts read through the local `git` executable.
pub struct GitService {
    runner: Arc<dyn CommandRunner>,
    path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub date: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub subject: String,
}

/// Summary of `git status --porcelain --branch`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    pub branch: String,
    pub staged: usize,
    pub modified: usize,
    pub untracked: usize,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.staged + self.modified + self.untracked == 0 {
            return write!(f, "{}: clean", self.branch);
        }
        write!(
            f,
            "{}: {} staged, {} modified, {} untracked",
            self.branch, self.staged, self.modified, self.untracked
        )
    }
}

impl GitService {
    pub fn new(runner: Arc<dyn CommandRunner>, path: &str) -> Self {
        Self {
            runner,
            path: path.to_string(),
        }
    }

    fn git(&self, args: &str) -> Result<String, ServiceError> {
        self.runner
            .run(&format!("git -C {} {}", shell_quote(&self.path), args))
    }

    fn branches(&self) -> Result<Vec<Branch>, ServiceError> {
        let format = ["%(refname:short)", "%(committerdate:short)", "%(authorname)"]
            .join(&FIELD_SEPARATOR.to_string());
        let out = self.git(&format!(
            "for-each-ref --sort=-committerdate --format={} refs/heads",
            shell_quote(&format)
        ))?;
        Ok(parse_branches(&out))
    }

    fn commits(&self, limit: usize) -> Result<Vec<Commit>, ServiceError> {
        let format = ["%h", "%an", "%ad", "%s"].join(&FIELD_SEPARATOR.to_string());
        let out = self.git(&format!(
            "log --max-count={} --date=short --format={}",
            limit,
            shell_quote(&format)
        ))?;
        Ok(parse_log(&out))
    }
}

impl super::Service for GitService {
    fn create_widget(
        &self,
        widget: &Widget,
        options: &Options,
        _ctx: &WidgetContext,
    ) -> Result<RenderTask, ServiceError> {
        let (title, height, draw) = match widget_key(widget) {
            "table_branches" => {
                let mut rows: Vec<Vec<String>> = self
                    .branches()?
                    .into_iter()
                    .map(|b| vec![b.name, b.date, b.author])
                    .collect();
                rows.truncate(row_limit(options, 5)?);
                let data = TableData {
                    headers: headers(options, &["Branch", "Last commit", "Author"]),
                    rows,
                };
                ("Branches", TABLE_HEIGHT, Draw::Table(data))
            }
            "table_commits" => {
                let limit = row_limit(options, 5)?;
                let characters = options.parse_or(&["character_limit"], 1000)?;
                let rows = self
                    .commits(limit)?
                    .into_iter()
                    .map(|c| vec![c.hash, c.author, c.date, truncate_chars(&c.subject, characters)])
                    .collect();
                let data = TableData {
                    headers: headers(options, &["Commit", "Author", "Date", "Subject"]),
                    rows,
                };
                ("Commits", TABLE_HEIGHT, Draw::Table(data))
            }
            "box_status" => {
                let status = parse_status(&self.git("status --porcelain --branch")?);
                ("Status", TEXT_HEIGHT, Draw::Text(status.to_string()))
            }
            _ => return Err(unsupported(ServiceKind::Git, widget)),
        };

        let decor = Decor::from_options(options, title, height)?;
        Ok(RenderTask::new(widget.name.as_str(), decor, draw))
    }
}

fn fields(line: &str, count: usize) -> Option<Vec<String>> {
    let parts: Vec<String> = line
        .splitn(count, FIELD_SEPARATOR)
        .map(str::to_string)
        .collect();
    (parts.len() == count).then_some(parts)
}

pub fn parse_branches(raw: &str) -> Vec<Branch> {
    raw.lines()
        .filter_map(|line| {
            let mut f = fields(line, 3)?.into_iter();
            Some(Branch {
                name: f.next()?,
                date: f.next()?,
                author: f.next()?,
            })
        })
        .collect()
}

pub fn parse_log(raw: &str) -> Vec<Commit> {
    raw.lines()
        .filter_map(|line| {
            let mut f = fields(line, 4)?.into_iter();
            Some(Commit {
                hash: f.next()?,
                author: f.next()?,
                date: f.next()?,
                subject: f.next()?,
            })
        })
        .collect()
}

pub fn parse_status(raw: &str) -> Status {
    let mut status = Status::default();
    for line in raw.lines() {
        if let Some(head) = line.strip_prefix("## ") {
            status.branch = head
                .split("...")
                .next()
                .unwrap_or(head)
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            continue;
        }
        let mut code = line.chars();
        let (Some(index), Some(tree)) = (code.next(), code.next()) else {
            continue;
        };
        if index == '?' {
            status.untracked += 1;
            continue;
        }
        if index != ' ' {
            status.staged += 1;
        }
        if tree != ' ' {
            status.modified += 1;
        }
    }
    status
}
