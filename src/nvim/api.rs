//! Typed wrappers for the Neovim API methods the driver consumes.

use async_trait::async_trait;
use rmpv::Value;

use super::session::Session;
use super::value::{as_array, as_i64, as_string};
use crate::error::DriverError;

/// Extension trait with the `nvim_*` request surface.
///
/// Implemented for every [`Session`], including `dyn Session`.
#[async_trait]
pub trait NvimApi: Session {
    /// Evaluate a Vimscript expression.
    async fn eval(&self, expr: &str) -> Result<Value, DriverError> {
        self.request("nvim_eval", vec![Value::from(expr)]).await
    }

    /// Execute an Ex command.
    async fn command(&self, cmd: &str) -> Result<(), DriverError> {
        self.request("nvim_command", vec![Value::from(cmd)]).await?;
        Ok(())
    }

    /// Call a Vimscript function with positional arguments.
    async fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        self.request("nvim_call_function", vec![Value::from(name), Value::Array(args)])
            .await
    }

    /// List buffer handles.
    async fn list_bufs(&self) -> Result<Vec<Value>, DriverError> {
        let result = self.request("nvim_list_bufs", vec![]).await?;
        Ok(as_array(&result, "buffer list")?.to_vec())
    }

    /// Queue raw key input. Returns the number of bytes written.
    async fn input(&self, keys: &str) -> Result<i64, DriverError> {
        let result = self.request("nvim_input", vec![Value::from(keys)]).await?;
        as_i64(&result, "input byte count")
    }

    /// Fetch `[channel_id, metadata]`.
    async fn get_api_info(&self) -> Result<Value, DriverError> {
        self.request("nvim_get_api_info", vec![]).await
    }

    /// Register this client as a UI.
    async fn ui_attach(&self, cols: i64, rows: i64, options: Value) -> Result<(), DriverError> {
        self.request(
            "nvim_ui_attach",
            vec![Value::from(cols), Value::from(rows), options],
        )
        .await?;
        Ok(())
    }

    /// Ask the engine to resize the UI grid.
    async fn ui_try_resize(&self, cols: i64, rows: i64) -> Result<(), DriverError> {
        self.request(
            "nvim_ui_try_resize",
            vec![Value::from(cols), Value::from(rows)],
        )
        .await?;
        Ok(())
    }

    /// Read lines `[start, end)` (zero-based, end-exclusive) of a buffer.
    async fn buf_get_lines(
        &self,
        buffer: i64,
        start: i64,
        end: i64,
        strict_indexing: bool,
    ) -> Result<Vec<String>, DriverError> {
        let result = self
            .request(
                "nvim_buf_get_lines",
                vec![
                    Value::from(buffer),
                    Value::from(start),
                    Value::from(end),
                    Value::from(strict_indexing),
                ],
            )
            .await?;
        as_array(&result, "buffer lines")?
            .iter()
            .map(|line| as_string(line, "buffer line"))
            .collect()
    }
}

impl<S: Session + ?Sized> NvimApi for S {}
