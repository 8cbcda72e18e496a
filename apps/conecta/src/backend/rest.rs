//! Table access and remote procedure calls (`/rest/v1/*`).

use std::fmt::Display;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::BackendClient;
use crate::errors::AppError;

/// A query against one table. Filters are combined with AND.
#[must_use]
pub struct TableQuery<'a> {
    client: &'a BackendClient,
    table: String,
    params: Vec<(String, String)>,
}

impl BackendClient {
    pub fn table(&self, table: &str) -> TableQuery<'_> {
        TableQuery {
            client: self,
            table: table.to_string(),
            params: Vec::new(),
        }
    }

    /// `POST /rest/v1/rpc/<function>` with named arguments.
    pub async fn rpc<A, T>(&self, function: &str, args: &A) -> Result<T, AppError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, &format!("/rest/v1/rpc/{function}"))
            .await?
            .json(args);
        self.send_json(request).await
    }
}

impl<'a> TableQuery<'a> {
    /// Column list, including embedded resources such as `*,planes_moviles(*)`.
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn is_true(self, column: &str) -> Self {
        self.filter(column, "is", "true")
    }

    fn filter(mut self, column: &str, operator: &str, value: impl Display) -> Self {
        self.params
            .push((column.to_string(), format!("{operator}.{value}")));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{column}.{direction}")));
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.params.push(("limit".to_string(), count.to_string()));
        self
    }

    fn path(&self) -> String {
        format!("/rest/v1/{}", self.table)
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, AppError> {
        let request = self
            .client
            .request(Method::GET, &self.path())
            .await?
            .query(&self.params);
        self.client.send_json(request).await
    }

    /// First matching row, if any.
    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, AppError> {
        let rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts and returns the stored rows (with server-generated columns).
    pub async fn insert<B, T>(self, body: &B) -> Result<Vec<T>, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.write(Method::POST, body, "return=representation").await
    }

    /// Updates every row matching the filters and returns them. An empty
    /// result means no row matched.
    pub async fn update<B, T>(self, body: &B) -> Result<Vec<T>, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.write(Method::PATCH, body, "return=representation").await
    }

    pub async fn delete(self) -> Result<(), AppError> {
        let request = self
            .client
            .request(Method::DELETE, &self.path())
            .await?
            .query(&self.params);
        self.client.send(request).await?;
        Ok(())
    }

    async fn write<B, T>(self, method: Method, body: &B, prefer: &str) -> Result<Vec<T>, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .request(method, &self.path())
            .await?
            .header("Prefer", prefer)
            .query(&self.params)
            .json(body);
        self.client.send_json(request).await
    }

    #[cfg(test)]
    fn params(&self) -> &[(String, String)] {
        &self.params
    }
}
