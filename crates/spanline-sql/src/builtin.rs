//! Built-in PostgreSQL functions
//!
//! Calls to these never have their bodies analyzed; their lineage is the
//! union of their arguments.

/// Sorted names of built-in functions
const BUILTIN_FUNCTIONS: &[&str] = &[
    "abs", "acos", "acosd", "acosh", "age", "any_value", "array", "array_agg", "array_append",
    "array_cat", "array_dims", "array_fill", "array_length", "array_lower", "array_ndims",
    "array_position", "array_positions", "array_prepend", "array_remove", "array_replace",
    "array_to_json", "array_to_string", "array_upper", "ascii", "asin", "asind", "asinh",
    "atan", "atan2", "atan2d", "atand", "atanh", "avg", "bit_and", "bit_count", "bit_length",
    "bit_or", "bit_xor", "bool_and", "bool_or", "btrim", "cardinality", "cbrt", "ceil",
    "ceiling", "char_length", "character_length", "chr", "clock_timestamp", "coalesce",
    "concat", "concat_ws", "convert", "convert_from", "convert_to", "corr", "cos", "cosd",
    "cosh", "cot", "cotd", "count", "covar_pop", "covar_samp", "cume_dist", "current_catalog",
    "current_database", "current_date", "current_role", "current_schema", "current_schemas",
    "current_setting", "current_time", "current_timestamp", "current_user", "currval",
    "date_bin", "date_part", "date_trunc", "decode", "degrees", "dense_rank", "digest", "div",
    "encode", "every", "exists", "exp", "extract", "factorial", "first_value", "floor",
    "format", "format_type", "gcd", "gen_random_uuid", "generate_series", "generate_subscripts",
    "get_bit", "get_byte", "greatest", "grouping", "has_table_privilege", "hashtext", "initcap",
    "isfinite", "json_agg", "json_array_elements", "json_array_elements_text",
    "json_array_length", "json_build_array", "json_build_object", "json_each", "json_each_text",
    "json_extract_path", "json_extract_path_text", "json_object", "json_object_agg",
    "json_object_keys", "json_populate_record", "json_populate_recordset", "json_strip_nulls",
    "json_to_record", "json_to_recordset", "json_typeof", "jsonb_agg", "jsonb_array_elements",
    "jsonb_array_elements_text", "jsonb_array_length", "jsonb_build_array",
    "jsonb_build_object", "jsonb_each", "jsonb_each_text", "jsonb_extract_path",
    "jsonb_extract_path_text", "jsonb_insert", "jsonb_object", "jsonb_object_agg",
    "jsonb_object_keys", "jsonb_path_exists", "jsonb_path_query", "jsonb_path_query_array",
    "jsonb_path_query_first", "jsonb_populate_record", "jsonb_populate_recordset",
    "jsonb_pretty", "jsonb_set", "jsonb_strip_nulls", "jsonb_to_record", "jsonb_to_recordset",
    "jsonb_typeof", "justify_days", "justify_hours", "justify_interval", "lag", "last_value",
    "lastval", "lcm", "lead", "least", "left", "length", "ln", "localtime", "localtimestamp",
    "log", "log10", "lower", "lpad", "ltrim", "make_date", "make_interval", "make_time",
    "make_timestamp", "make_timestamptz", "max", "md5", "min", "mod", "mode", "nextval", "now",
    "nth_value", "ntile", "nullif", "num_nonnulls", "num_nulls", "octet_length", "overlay",
    "percent_rank", "percentile_cont", "percentile_disc", "pg_backend_pid", "pg_column_size",
    "pg_get_functiondef", "pg_get_viewdef", "pg_relation_size", "pg_size_pretty", "pg_sleep",
    "pg_typeof", "pi", "position", "power", "quote_ident", "quote_literal", "quote_nullable",
    "radians", "random", "rank", "regexp_count", "regexp_instr", "regexp_like", "regexp_match",
    "regexp_matches", "regexp_replace", "regexp_split_to_array", "regexp_split_to_table",
    "regexp_substr", "repeat", "replace", "reverse", "right", "round", "row", "row_number",
    "row_to_json", "rpad", "rtrim", "scale", "session_user", "set_config", "setseed", "setval",
    "sha224", "sha256", "sha384", "sha512", "sign", "sin", "sind", "sinh", "split_part", "sqrt",
    "starts_with", "statement_timestamp", "stddev", "stddev_pop", "stddev_samp", "string_agg",
    "string_to_array", "string_to_table", "strpos", "substr", "substring", "sum", "tan", "tand",
    "tanh", "timeofday", "to_ascii", "to_char", "to_date", "to_hex", "to_json", "to_jsonb",
    "to_number", "to_timestamp", "transaction_timestamp", "translate", "trim", "trim_scale",
    "trunc", "unnest", "upper", "user", "uuid_generate_v4", "var_pop", "var_samp", "variance",
    "version", "width_bucket", "xmlagg", "xmlelement", "xmlforest",
];

/// SQL value keywords that parse as bare identifiers
const VALUE_KEYWORDS: &[&str] = &[
    "current_catalog",
    "current_date",
    "current_role",
    "current_schema",
    "current_time",
    "current_timestamp",
    "current_user",
    "localtime",
    "localtimestamp",
    "session_user",
    "user",
];

/// Check if a function is built in
///
/// `schema` is the qualifying schema, if any. Anything qualified by
/// `pg_catalog` is built in.
pub fn is_builtin_function(schema: Option<&str>, name: &str) -> bool {
    match schema {
        Some("pg_catalog") => true,
        Some(_) => false,
        None => BUILTIN_FUNCTIONS.binary_search(&name).is_ok(),
    }
}

/// Check if an unquoted identifier is a SQL value keyword
pub fn is_value_keyword(name: &str) -> bool {
    VALUE_KEYWORDS.binary_search(&name).is_ok()
}
