//! Label keys written by the capture instrumentation

/// Inbound HTTP target path; its presence on a root marks the HTTP domain
pub const HTTP_TARGET: &str = "http.target";
/// HTTP method
pub const HTTP_METHOD: &str = "/http/method";
/// Full outbound URL, query string included
pub const HTTP_URL: &str = "/http/url";
/// Serialized request body
pub const HTTP_REQUEST_BODY: &str = "http.req.body";
/// Serialized response body
pub const HTTP_RESPONSE_BODY: &str = "http.res.body";
/// Response status code, decimal
pub const HTTP_STATUS_CODE: &str = "/http/status_code";
/// Response headers as a JSON object
pub const HTTP_RESPONSE_HEADERS: &str = "cp.res.headers";

/// Procedure name; its presence on a root marks the named-call domain
pub const CALL_NAME: &str = "cp.req.name";
/// Serialized call request
pub const CALL_REQUEST_BODY: &str = "cp.req.body";
/// Serialized call response
pub const CALL_RESPONSE_BODY: &str = "cp.res.body";

/// Statement text
pub const DB_STATEMENT: &str = "db.statement";
/// Bound parameter values
pub const DB_VALUES: &str = "db.postgresql.values";
/// Successful result as JSON `{rows, rowCount}`
pub const DB_RESULTS: &str = "db.results";

/// Recorded error message
pub const ERROR_MESSAGE: &str = "cp.error.message";
/// Recorded error schema
pub const ERROR_SCHEMA: &str = "cp.error.schema";
/// Recorded error table
pub const ERROR_TABLE: &str = "cp.error.table";
/// Recorded error column
pub const ERROR_COLUMN: &str = "cp.error.column";
/// Recorded error data type
pub const ERROR_DATA_TYPE: &str = "cp.error.dataType";
/// Recorded error constraint
pub const ERROR_CONSTRAINT: &str = "cp.error.constraint";
