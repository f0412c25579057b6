use crate::backend::traits::Backend;
use crate::errors::CoreError;
use crate::models::stock::StockInput;
use crate::services::stock_service::StockService;

/// Column of the bulk-import sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportColumn {
    Ticker,
    Name,
    Sector,
    MarketCap,
    ReturnRate,
    Per,
    Pbr,
    Psr,
    Description,
    Keywords,
}

impl ImportColumn {
    const ALL: [ImportColumn; 10] = [
        ImportColumn::Ticker,
        ImportColumn::Name,
        ImportColumn::Sector,
        ImportColumn::MarketCap,
        ImportColumn::ReturnRate,
        ImportColumn::Per,
        ImportColumn::Pbr,
        ImportColumn::Psr,
        ImportColumn::Description,
        ImportColumn::Keywords,
    ];

    /// Header spellings accepted for this column (compared after normalizing).
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            ImportColumn::Ticker => &["ticker", "symbol", "code", "티커", "종목코드", "코드"],
            ImportColumn::Name => &["name", "company", "종목명", "기업명", "회사명", "이름"],
            ImportColumn::Sector => &["sector", "industry", "섹터", "업종", "산업"],
            ImportColumn::MarketCap => &["marketcap", "mktcap", "시가총액", "시총"],
            ImportColumn::ReturnRate => &["return", "returnrate", "수익률"],
            ImportColumn::Per => &["per", "pe"],
            ImportColumn::Pbr => &["pbr", "pb"],
            ImportColumn::Psr => &["psr", "ps"],
            ImportColumn::Description => &["description", "desc", "설명", "기업설명", "개요"],
            ImportColumn::Keywords => &["keywords", "keyword", "tags", "키워드", "태그"],
        }
    }

    fn from_header(header: &str) -> Option<Self> {
        let normalized = normalize_header(header);
        Self::ALL
            .into_iter()
            .find(|c| c.aliases().iter().any(|a| *a == normalized))
    }
}

/// Result of parsing a sheet. Rows with problems are reported, not fatal.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub rows: Vec<StockInput>,
    /// One entry per rejected row.
    pub errors: Vec<CoreError>,
    /// Blank lines skipped.
    pub skipped: usize,
}

/// Parses spreadsheet exports for the stock bulk import.
pub struct ImportService {
    stock_service: StockService,
}

impl ImportService {
    pub fn new() -> Self {
        Self {
            stock_service: StockService::new(),
        }
    }

    /// Parse a delimited export (comma, semicolon or tab; detected from the
    /// header line). The header must contain at least a ticker and a name
    /// column; unknown columns are ignored.
    pub fn parse_stock_sheet(&self, text: &str) -> Result<ImportReport, CoreError> {
        let text = text.trim_start_matches('\u{feff}');
        let mut lines = text.lines().enumerate();

        let (_, header_line) = lines
            .by_ref()
            .find(|(_, l)| !l.trim().is_empty())
            .ok_or_else(|| CoreError::ValidationError("sheet is empty".into()))?;
        let delimiter = detect_delimiter(header_line);
        let columns: Vec<Option<ImportColumn>> = split_record(header_line, delimiter)
            .iter()
            .map(|h| ImportColumn::from_header(h))
            .collect();

        for required in [ImportColumn::Ticker, ImportColumn::Name] {
            if !columns.contains(&Some(required)) {
                return Err(CoreError::ValidationError(format!(
                    "sheet has no {required:?} column"
                )));
            }
        }

        let mut report = ImportReport::default();
        for (index, line) in lines {
            if line.trim().is_empty() {
                report.skipped += 1;
                continue;
            }
            // Spreadsheet row numbers are 1-based.
            let row_number = index + 1;
            let cells = split_record(line, delimiter);
            match build_row(&columns, &cells, row_number) {
                Ok(row) => report.rows.push(row),
                Err(e) => report.errors.push(e),
            }
        }

        Ok(report)
    }

    /// Send parsed rows to the backend as one bulk update.
    pub async fn import_stocks(
        &self,
        backend: &dyn Backend,
        report: &ImportReport,
    ) -> Result<usize, CoreError> {
        self.stock_service.bulk_update(backend, &report.rows).await
    }
}

impl Default for ImportService {
    fn default() -> Self {
        Self::new()
    }
}

fn build_row(
    columns: &[Option<ImportColumn>],
    cells: &[String],
    row: usize,
) -> Result<StockInput, CoreError> {
    let mut input = StockInput::default();

    for (column, cell) in columns.iter().zip(cells) {
        let Some(column) = column else { continue };
        let value = cell.trim();
        if value.is_empty() {
            continue;
        }
        let number = || {
            parse_number(value).ok_or_else(|| CoreError::Import {
                row,
                message: format!("{column:?} is not a number: '{value}'"),
            })
        };
        match column {
            ImportColumn::Ticker => input.ticker = Some(value.to_uppercase()),
            ImportColumn::Name => input.name = Some(value.to_string()),
            ImportColumn::Sector => input.sector = Some(value.to_string()),
            ImportColumn::MarketCap => input.market_cap = Some(number()?),
            ImportColumn::ReturnRate => input.return_rate = Some(number()?),
            ImportColumn::Per => input.per = Some(number()?),
            ImportColumn::Pbr => input.pbr = Some(number()?),
            ImportColumn::Psr => input.psr = Some(number()?),
            ImportColumn::Description => input.description = Some(value.to_string()),
            ImportColumn::Keywords => input.keywords = Some(split_keywords(value)),
        }
    }

    if input.ticker.is_none() {
        return Err(CoreError::Import {
            row,
            message: "ticker is missing".into(),
        });
    }
    if input.name.is_none() {
        return Err(CoreError::Import {
            row,
            message: "name is missing".into(),
        });
    }
    Ok(input)
}

/// Lowercase and drop spaces, punctuation and unit markers such as `(%)`.
fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-' | '.' | '(' | ')' | '/' | '%'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn detect_delimiter(line: &str) -> char {
    let semicolons = line.matches(';').count();
    let commas = line.matches(',').count();
    let tabs = line.matches('\t').count();

    if tabs > 0 && tabs >= commas && tabs >= semicolons {
        '\t'
    } else if semicolons > commas {
        ';'
    } else {
        ','
    }
}

/// Split one record, honouring double quotes (`""` is an escaped quote).
fn split_record(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                cells.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    cells.push(current);
    cells
}

/// Accepts `1,234.5`, `12.3%`, `-4`; thousands separators and a trailing
/// percent sign are dropped.
fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | ' ' | '₩'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Keywords are separated by commas, semicolons, slashes, pipes or `#`.
fn split_keywords(value: &str) -> Vec<String> {
    value
        .split(|c| matches!(c, ',' | ';' | '/' | '|' | '#'))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_cells_keep_delimiters() {
        let cells = split_record(r#"005930,"삼성전자, 우선주","say ""hi""""#, ',');
        assert_eq!(cells, vec!["005930", "삼성전자, 우선주", r#"say "hi""#]);
    }

    #[test]
    fn delimiter_detection() {
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a;b;c"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
    }

    #[test]
    fn numbers_with_separators_and_percent() {
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number("12.3%"), Some(12.3));
        assert_eq!(parse_number("-4"), Some(-4.0));
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn header_aliases_are_bilingual() {
        assert_eq!(ImportColumn::from_header("Market Cap"), Some(ImportColumn::MarketCap));
        assert_eq!(ImportColumn::from_header("시가총액"), Some(ImportColumn::MarketCap));
        assert_eq!(ImportColumn::from_header("종목명"), Some(ImportColumn::Name));
        assert_eq!(ImportColumn::from_header("PER"), Some(ImportColumn::Per));
        assert_eq!(ImportColumn::from_header("unknown"), None);
    }
}
