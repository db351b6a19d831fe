//! Line-oriented command script parsing.

use repcrec_core::{RepcrecError, RepcrecResult, SiteId, TransactionId, VariableId};
use repcrec_engine::Command;

/// What one line of a script yields: a command to run, or a signal to stop
/// reading further lines.
#[derive(Debug)]
pub enum Line {
    /// A parsed command.
    Command(Command),
    /// A blank line, `quit`, or a line starting with `===` — stop reading.
    Halt,
}

/// Parse one script line (1-based `line_no`, used in diagnostics).
///
/// `//` begins a comment that runs to the end of the line. Whitespace
/// inside argument lists is ignored. An unrecognized command name is a
/// `ParseError`, which the driver treats as fatal per the external
/// interface contract.
pub fn parse_line(raw: &str, line_no: usize) -> RepcrecResult<Line> {
    let without_comment = match raw.find("//") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let trimmed = without_comment.trim();

    if trimmed.is_empty() || trimmed == "quit" || trimmed.starts_with("===") {
        return Ok(Line::Halt);
    }

    let open = trimmed.find('(').ok_or_else(|| RepcrecError::ParseError {
        line: line_no,
        message: format!("expected '(' in {trimmed:?}"),
    })?;
    if !trimmed.ends_with(')') {
        return Err(RepcrecError::ParseError {
            line: line_no,
            message: format!("expected ')' at end of {trimmed:?}"),
        });
    }
    let name = trimmed[..open].trim();
    let args_str = &trimmed[open + 1..trimmed.len() - 1];
    let args: Vec<&str> = if args_str.trim().is_empty() {
        Vec::new()
    } else {
        args_str.split(',').map(str::trim).collect()
    };

    let command = match name {
        "begin" => Command::Begin(require_tid(&args, 0, line_no)?),
        "beginRO" => Command::BeginReadOnly(require_tid(&args, 0, line_no)?),
        "R" => Command::Read {
            tid: require_tid(&args, 0, line_no)?,
            vid: require_vid(&args, 1, line_no)?,
        },
        "W" => Command::Write {
            tid: require_tid(&args, 0, line_no)?,
            vid: require_vid(&args, 1, line_no)?,
            value: require_value(&args, 2, line_no)?,
        },
        "end" => Command::End(require_tid(&args, 0, line_no)?),
        "fail" => Command::Fail(require_site(&args, 0, line_no)?),
        "recover" => Command::Recover(require_site(&args, 0, line_no)?),
        "dump" => Command::Dump,
        other => {
            return Err(RepcrecError::UnknownCommand(other.to_string()));
        }
    };
    Ok(Line::Command(command))
}

fn require_arg<'a>(args: &[&'a str], index: usize, line_no: usize) -> RepcrecResult<&'a str> {
    args.get(index).copied().ok_or_else(|| RepcrecError::ParseError {
        line: line_no,
        message: format!("expected at least {} argument(s)", index + 1),
    })
}

fn require_tid(args: &[&str], index: usize, line_no: usize) -> RepcrecResult<TransactionId> {
    Ok(TransactionId::new(require_arg(args, index, line_no)?))
}

fn require_vid(args: &[&str], index: usize, line_no: usize) -> RepcrecResult<VariableId> {
    let raw = require_arg(args, index, line_no)?;
    VariableId::parse(raw).ok_or_else(|| RepcrecError::ParseError {
        line: line_no,
        message: format!("not a variable name: {raw:?}"),
    })
}

fn require_value(args: &[&str], index: usize, line_no: usize) -> RepcrecResult<i64> {
    let raw = require_arg(args, index, line_no)?;
    raw.parse().map_err(|_| RepcrecError::ParseError {
        line: line_no,
        message: format!("not an integer: {raw:?}"),
    })
}

fn require_site(args: &[&str], index: usize, line_no: usize) -> RepcrecResult<SiteId> {
    let raw = require_arg(args, index, line_no)?;
    raw.parse()
        .map(SiteId::new)
        .map_err(|_| RepcrecError::ParseError {
            line: line_no,
            message: format!("not a site id: {raw:?}"),
        })
}
