//! Structured query representation.
//!
//! Builders assemble a [`SelectQuery`] from typed clauses; text exists only
//! after [`std::fmt::Display`] renders it. Literal values are quoted and
//! escaped by the renderer, never spliced by callers.

use std::fmt;

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    /// Population standard deviation.
    StddevPop,
    /// Interpolated median.
    Median,
    Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Text(String),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Aggregate(AggFunc, Box<Expr>),
    CountAll,
    Extract(DatePart, Box<Expr>),
    /// `a / NULLIF(b, 0)`
    Ratio(Box<Expr>, Box<Expr>),
    /// Round to `n` decimal places.
    Round(Box<Expr>, u32),
    Literal(Literal),
}

impl Expr {
    pub fn col(name: &str) -> Self {
        Expr::Column(name.to_string())
    }

    pub fn agg(func: AggFunc, inner: Expr) -> Self {
        Expr::Aggregate(func, Box::new(inner))
    }

    pub fn sum(column: &str) -> Self {
        Expr::agg(AggFunc::Sum, Expr::col(column))
    }

    pub fn extract(part: DatePart, column: &str) -> Self {
        Expr::Extract(part, Box::new(Expr::col(column)))
    }

    pub fn ratio(numerator: Expr, denominator: Expr) -> Self {
        Expr::Ratio(Box::new(numerator), Box::new(denominator))
    }

    pub fn round(inner: Expr, places: u32) -> Self {
        Expr::Round(Box::new(inner), places)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Expr, Literal),
    In(Expr, Vec<Literal>),
    Between(Expr, Literal, Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub projections: Vec<Projection>,
    pub from: String,
    pub filters: Vec<Predicate>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SelectQuery {
    pub fn from_table(table: &str) -> Self {
        Self {
            projections: Vec::new(),
            from: table.to_string(),
            filters: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn select(mut self, expr: Expr) -> Self {
        self.projections.push(Projection { expr, alias: None });
        self
    }

    pub fn select_as(mut self, expr: Expr, alias: &str) -> Self {
        self.projections.push(Projection {
            expr,
            alias: Some(alias.to_string()),
        });
        self
    }

    pub fn select_columns(self, columns: &[&str]) -> Self {
        columns
            .iter()
            .fold(self, |q, column| q.select(Expr::col(column)))
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn group(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn order(mut self, expr: Expr, descending: bool) -> Self {
        self.order_by.push(OrderBy { expr, descending });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// True when the query aggregates rows.
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty()
            || self
                .projections
                .iter()
                .any(|p| matches!(p.expr, Expr::Aggregate(..) | Expr::CountAll))
    }
}

// ── Rendering ──────────────────────────────────────────────────

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Date(d) => write!(f, "DATE '{}'", d.format("%Y-%m-%d")),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => f.write_str(name),
            Expr::CountAll => f.write_str("COUNT(*)"),
            Expr::Aggregate(func, inner) => match func {
                AggFunc::Sum => write!(f, "SUM({inner})"),
                AggFunc::Avg => write!(f, "AVG({inner})"),
                AggFunc::Min => write!(f, "MIN({inner})"),
                AggFunc::Max => write!(f, "MAX({inner})"),
                AggFunc::Count => write!(f, "COUNT({inner})"),
                AggFunc::StddevPop => write!(f, "STDDEV_POP({inner})"),
                AggFunc::Median => write!(f, "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY {inner})"),
                AggFunc::Mode => write!(f, "MODE() WITHIN GROUP (ORDER BY {inner})"),
            },
            Expr::Extract(part, inner) => {
                let part = match part {
                    DatePart::Year => "YEAR",
                    DatePart::Month => "MONTH",
                };
                write!(f, "EXTRACT({part} FROM {inner})")
            }
            Expr::Ratio(a, b) => write!(f, "{a} / NULLIF({b}, 0)"),
            Expr::Round(inner, places) => write!(f, "ROUND(CAST({inner} AS NUMERIC), {places})"),
            Expr::Literal(lit) => write!(f, "{lit}"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Eq(expr, lit) => write!(f, "{expr} = {lit}"),
            Predicate::In(expr, values) => {
                let list: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{expr} IN ({})", list.join(", "))
            }
            Predicate::Between(expr, lo, hi) => write!(f, "{expr} BETWEEN {lo} AND {hi}"),
        }
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {alias}", self.expr),
            None => write!(f, "{}", self.expr),
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{} DESC", self.expr)
        } else {
            write!(f, "{}", self.expr)
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.projections.is_empty() {
            write!(f, "SELECT * FROM {}", self.from)?;
        } else {
            write!(f, "SELECT {} FROM {}", join(&self.projections, ", "), self.from)?;
        }
        if !self.filters.is_empty() {
            write!(f, " WHERE {}", join(&self.filters, " AND "))?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", join(&self.group_by, ", "))?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", join(&self.order_by, ", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}
