//! Dialect rendering of [`QueryHints`].

use eagerload_types::Dialect;

use crate::spec::{IndexHintKind, LockMode, QueryHints};

/// Hint fragments, each empty or carrying its own separating whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RenderedHints {
    /// Before the outer `SELECT`.
    pub leading: String,
    /// Right after the outer `SELECT` keyword.
    pub after_select: String,
    /// After the root table reference.
    pub table_suffix: String,
    /// At the very end of the statement.
    pub trailing: String,
}

pub(crate) fn render(hints: &QueryHints, dialect: Dialect) -> RenderedHints {
    let mut out = RenderedHints::default();
    if hints.is_empty() {
        return out;
    }

    match dialect {
        Dialect::MySQL => {
            let mut optimizer: Vec<String> = Vec::new();
            if let Some(ms) = hints.timeout_ms {
                optimizer.push(format!("MAX_EXECUTION_TIME({ms})"));
            }
            optimizer.extend(hints.optimizer.iter().cloned());
            if !optimizer.is_empty() {
                out.after_select = format!("/*+ {} */ ", optimizer.join(" "));
            }
            if hints.no_cache {
                out.after_select.push_str("SQL_NO_CACHE ");
            }
        }
        Dialect::SQLite | Dialect::PostgreSQL => {
            if !hints.optimizer.is_empty() {
                out.leading = format!("/*+ {} */ ", hints.optimizer.join(" "));
            }
            if hints.timeout_ms.is_some() || hints.no_cache {
                crate::eager_debug!("emit", "timeout and cache hints are ignored on {dialect:?}");
            }
        }
    }

    if let Some(index) = &hints.index {
        out.table_suffix = match (dialect, index.kind) {
            (Dialect::MySQL, kind) => {
                let keyword = match kind {
                    IndexHintKind::Use => "USE",
                    IndexHintKind::Force => "FORCE",
                    IndexHintKind::Ignore => "IGNORE",
                };
                format!(" {keyword} INDEX ({})", dialect.quote_ident(&index.index))
            }
            (Dialect::SQLite, IndexHintKind::Ignore) => " NOT INDEXED".to_string(),
            (Dialect::SQLite, _) => format!(" INDEXED BY {}", dialect.quote_ident(&index.index)),
            (Dialect::PostgreSQL, _) => {
                crate::eager_debug!("emit", "index hint `{}` ignored on PostgreSQL", index.index);
                String::new()
            }
        };
    }

    if let Some(lock) = hints.lock {
        match dialect {
            Dialect::SQLite => {
                crate::eager_debug!("emit", "row locks are not supported by SQLite");
            }
            _ => {
                out.trailing = match lock {
                    LockMode::Update => " FOR UPDATE".to_string(),
                    LockMode::Share => " FOR SHARE".to_string(),
                }
            }
        }
    }
    out
}
