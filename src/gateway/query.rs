//! Minimal typed query builder for PostgREST-style table endpoints.
//!
//! A [`Query`] is bound to one [`Table`] and only accepts that table's
//! [`Column`]s, so filters cannot reference a column from another table.
//! It renders to the `column=op.value` query pairs PostgREST expects.

use std::fmt::Display;
use std::marker::PhantomData;

/// A column name of one table.
pub trait Column: std::fmt::Debug + Copy + Send + Sync + 'static {
    fn as_str(&self) -> &'static str;
}

/// A table exposed by the database gateway.
pub trait Table: Send + Sync + 'static {
    const NAME: &'static str;
    type Column: Column;
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Eq(String),
    Gt(String),
    Lt(String),
    IsNull,
    NotNull,
}

impl Filter {
    fn render(&self) -> String {
        match self {
            Filter::Eq(v) => format!("eq.{v}"),
            Filter::Gt(v) => format!("gt.{v}"),
            Filter::Lt(v) => format!("lt.{v}"),
            Filter::IsNull => "is.null".to_string(),
            Filter::NotNull => "not.is.null".to_string(),
        }
    }
}

/// Filters, ordering and paging for one table.
#[derive(Debug, Clone)]
pub struct Query<T: Table> {
    filters: Vec<(T::Column, Filter)>,
    order: Option<(T::Column, Order)>,
    limit: Option<usize>,
    offset: Option<usize>,
    _table: PhantomData<T>,
}

impl<T: Table> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Table> Query<T> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            order: None,
            limit: None,
            offset: None,
            _table: PhantomData,
        }
    }

    pub fn eq(mut self, column: T::Column, value: impl Display) -> Self {
        self.filters.push((column, Filter::Eq(value.to_string())));
        self
    }

    pub fn gt(mut self, column: T::Column, value: impl Display) -> Self {
        self.filters.push((column, Filter::Gt(value.to_string())));
        self
    }

    pub fn lt(mut self, column: T::Column, value: impl Display) -> Self {
        self.filters.push((column, Filter::Lt(value.to_string())));
        self
    }

    pub fn is_null(mut self, column: T::Column) -> Self {
        self.filters.push((column, Filter::IsNull));
        self
    }

    pub fn not_null(mut self, column: T::Column) -> Self {
        self.filters.push((column, Filter::NotNull));
        self
    }

    pub fn order(mut self, column: T::Column, order: Order) -> Self {
        self.order = Some((column, order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render as URL query pairs (unencoded; the HTTP client encodes them).
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|(column, filter)| (column.as_str().to_string(), filter.render()))
            .collect();

        if let Some((column, order)) = self.order {
            let direction = match order {
                Order::Asc => "asc",
                Order::Desc => "desc",
            };
            pairs.push(("order".to_string(), format!("{}.{}", column.as_str(), direction)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }

        pairs
    }
}

/// `users` table.
#[derive(Debug, Clone, Copy)]
pub struct Users;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumn {
    Id,
    Email,
    CreatedAt,
}

impl Column for UserColumn {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Email => "email",
            Self::CreatedAt => "created_at",
        }
    }
}

impl Table for Users {
    const NAME: &'static str = "users";
    type Column = UserColumn;
}

/// `confirmation_tokens` table.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationTokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenColumn {
    TokenHash,
    UserId,
    Kind,
    ExpiresAt,
    ConsumedAt,
}

impl Column for TokenColumn {
    fn as_str(&self) -> &'static str {
        match self {
            Self::TokenHash => "token_hash",
            Self::UserId => "user_id",
            Self::Kind => "kind",
            Self::ExpiresAt => "expires_at",
            Self::ConsumedAt => "consumed_at",
        }
    }
}

impl Table for ConfirmationTokens {
    const NAME: &'static str = "confirmation_tokens";
    type Column = TokenColumn;
}

/// `location_preferences` table.
#[derive(Debug, Clone, Copy)]
pub struct LocationPreferencesTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationColumn {
    UserId,
}

impl Column for LocationColumn {
    fn as_str(&self) -> &'static str {
        match self {
            Self::UserId => "user_id",
        }
    }
}

impl Table for LocationPreferencesTable {
    const NAME: &'static str = "location_preferences";
    type Column = LocationColumn;
}
