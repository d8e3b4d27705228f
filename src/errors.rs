// File: src/errors.rs
//
// Error handling and reporting for gslang.
// Structured error types with source location information
// and pretty-printed error messages.

use colored::Colorize;
use std::fmt;

/// Source location information for tracking where code appears in a file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub file: Option<String>,
}

#[allow(dead_code)]
impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column, file: None }
    }

    pub fn with_file(line: usize, column: usize, file: String) -> Self {
        Self { line, column, file: Some(file) }
    }

    pub fn unknown() -> Self {
        Self { line: 0, column: 0, file: None }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}:{}:{}", file, self.line, self.column)
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Error taxonomy for gslang compile-time and runtime errors.
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum ErrorKind {
    ParseError,
    CompileError,
    WrongNumArguments,
    InvalidArgumentType,
    InvalidOperator,
    InvalidIndexType,
    InvalidIndexOnError,
    NotIndexable,
    NotIndexAssignable,
    IndexOutOfBounds,
    InvalidRangeStep,
    StringLimit,
    BytesLimit,
    ObjectAllocLimit,
    StackOverflow,
    FrameOverflow,
    NotImplemented,
    UndefinedVariable,
    DivisionByZero,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::ParseError => write!(f, "Parse Error"),
            ErrorKind::CompileError => write!(f, "Compile Error"),
            ErrorKind::WrongNumArguments => write!(f, "Wrong Number Of Arguments"),
            ErrorKind::InvalidArgumentType => write!(f, "Invalid Argument Type"),
            ErrorKind::InvalidOperator => write!(f, "Invalid Operator"),
            ErrorKind::InvalidIndexType => write!(f, "Invalid Index Type"),
            ErrorKind::InvalidIndexOnError => write!(f, "Invalid Index On Error"),
            ErrorKind::NotIndexable => write!(f, "Not Indexable"),
            ErrorKind::NotIndexAssignable => write!(f, "Not Index Assignable"),
            ErrorKind::IndexOutOfBounds => write!(f, "Index Out Of Bounds"),
            ErrorKind::InvalidRangeStep => write!(f, "Invalid Range Step"),
            ErrorKind::StringLimit => write!(f, "String Limit Exceeded"),
            ErrorKind::BytesLimit => write!(f, "Bytes Limit Exceeded"),
            ErrorKind::ObjectAllocLimit => write!(f, "Allocation Limit Exceeded"),
            ErrorKind::StackOverflow => write!(f, "Stack Overflow"),
            ErrorKind::FrameOverflow => write!(f, "Frame Overflow"),
            ErrorKind::NotImplemented => write!(f, "Not Implemented"),
            ErrorKind::UndefinedVariable => write!(f, "Undefined Variable"),
            ErrorKind::DivisionByZero => write!(f, "Division By Zero"),
        }
    }
}

/// A structured gslang error with location information.
#[derive(Debug, Clone)]
pub struct GsError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
    pub source_line: Option<String>,
    pub suggestion: Option<String>,
    pub help: Option<String>,
    pub note: Option<String>,
}

#[allow(dead_code)]
impl GsError {
    pub fn new(kind: ErrorKind, message: String, location: SourceLocation) -> Self {
        Self {
            kind,
            message,
            location,
            source_line: None,
            suggestion: None,
            help: None,
            note: None,
        }
    }

    pub fn with_source(mut self, source_line: String) -> Self {
        self.source_line = Some(source_line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.note = Some(note);
        self
    }

    pub fn parse_error(message: String, location: SourceLocation) -> Self {
        Self::new(ErrorKind::ParseError, message, location)
    }

    pub fn compile_error(message: String, location: SourceLocation) -> Self {
        Self::new(ErrorKind::CompileError, message, location)
    }

    pub fn undefined_variable(name: &str, location: SourceLocation) -> Self {
        Self::new(ErrorKind::UndefinedVariable, format!("unresolved reference '{name}'"), location)
    }

    pub fn wrong_num_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WrongNumArguments, message.into(), SourceLocation::unknown())
    }

    pub fn invalid_argument_type(name: &str, expected: &str, found: &str) -> Self {
        Self::new(
            ErrorKind::InvalidArgumentType,
            format!("invalid type for argument '{name}': expected {expected}, found {found}"),
            SourceLocation::unknown(),
        )
    }

    pub fn invalid_operator(op: &str, lhs: &str, rhs: &str) -> Self {
        Self::new(
            ErrorKind::InvalidOperator,
            format!("invalid operation: {lhs} {op} {rhs}"),
            SourceLocation::unknown(),
        )
    }

    pub fn not_indexable(type_name: &str) -> Self {
        Self::new(ErrorKind::NotIndexable, format!("not indexable: {type_name}"), SourceLocation::unknown())
    }

    pub fn not_index_assignable(type_name: &str) -> Self {
        Self::new(
            ErrorKind::NotIndexAssignable,
            format!("not index-assignable: {type_name}"),
            SourceLocation::unknown(),
        )
    }

    pub fn index_out_of_bounds() -> Self {
        Self::new(ErrorKind::IndexOutOfBounds, "index out of bounds".to_string(), SourceLocation::unknown())
    }
}

impl fmt::Display for GsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind_str = format!("{}", self.kind);
        writeln!(f, "{}: {}", kind_str.red().bold(), self.message.bold())?;

        let location_str = format!("  --> {}", self.location);
        writeln!(f, "{}", location_str.bright_blue())?;

        if let Some(ref source) = self.source_line {
            let col_num = self.location.column;

            writeln!(f, "   {}", "|".bright_blue())?;
            writeln!(
                f,
                "{} {} {}",
                format!("{:3}", self.location.line).bright_blue(),
                "|".bright_blue(),
                source
            )?;
            writeln!(
                f,
                "   {} {}{}",
                "|".bright_blue(),
                " ".repeat(col_num.saturating_sub(1)),
                "^".red().bold()
            )?;
            writeln!(f, "   {}", "|".bright_blue())?;
        }

        if let Some(ref help) = self.help {
            writeln!(f, "   {} {}", "=".bright_yellow(), format!("help: {help}").bright_yellow())?;
        }

        if let Some(ref suggestion) = self.suggestion {
            writeln!(
                f,
                "   {} {}",
                "=".bright_green(),
                format!("did you mean '{suggestion}'?").bright_green()
            )?;
        }

        if let Some(ref note) = self.note {
            writeln!(f, "   {} {}", "=".bright_cyan(), format!("note: {note}").bright_cyan())?;
        }

        Ok(())
    }
}

impl std::error::Error for GsError {}

/// Computes the Levenshtein distance between two strings.
/// Used for "did you mean?" suggestions on unresolved references.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let len1 = s1.chars().count();
    let len2 = s2.chars().count();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate().take(len1 + 1) {
        row[0] = i;
    }
    for (j, cell) in matrix[0].iter_mut().enumerate().take(len2 + 1) {
        *cell = j;
    }

    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = std::cmp::min(
                std::cmp::min(matrix[i - 1][j] + 1, matrix[i][j - 1] + 1),
                matrix[i - 1][j - 1] + cost,
            );
        }
    }

    matrix[len1][len2]
}

/// Find the closest match from a list of candidates using Levenshtein distance.
/// Returns None if no candidate is within distance 3.
pub fn find_closest_match<'a>(target: &str, candidates: &'a [String]) -> Option<&'a str> {
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        let distance = levenshtein_distance(target, candidate);
        if distance <= 3 && distance < best_distance {
            best_distance = distance;
            best_match = Some(candidate.as_str());
        }
    }

    best_match
}
