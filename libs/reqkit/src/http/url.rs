//! URL assembly for route templates.

use crate::error::ContractError;
use crate::options::{PathParams, QueryParams};
use crate::route::placeholders;

/// Substitute `{name}` placeholders and append the encoded query string.
///
/// Every placeholder must have a matching entry in `path_params` and every entry must
/// name a placeholder; anything else is a programming error reported as [`ContractError`].
/// Query entries whose value is `None` are dropped.
pub fn build_url(
    path: &str,
    query_params: &QueryParams,
    path_params: &PathParams,
) -> Result<String, ContractError> {
    let names = placeholders(path);

    if let Some(extra) = path_params
        .keys()
        .find(|k| !names.contains(&k.as_str()))
    {
        return Err(ContractError::UnexpectedPathParam {
            path: path.to_string(),
            name: extra.clone(),
        });
    }

    let mut url = String::with_capacity(path.len() + 16);
    let mut rest = path;
    for name in &names {
        let token = format!("{{{name}}}");
        let Some(at) = rest.find(&token) else {
            continue;
        };
        let value = path_params
            .get(*name)
            .ok_or_else(|| ContractError::MissingPathParam {
                path: path.to_string(),
                name: (*name).to_string(),
            })?;
        url.push_str(&rest[..at]);
        url.push_str(&urlencoding::encode(&value.to_string()));
        rest = &rest[at + token.len()..];
    }
    url.push_str(rest);

    let query = encode_query(query_params);
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }
    Ok(url)
}

/// Form-encode query params, skipping absent values.
pub fn encode_query(query_params: &QueryParams) -> String {
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in query_params {
        if let Some(v) = value {
            ser.append_pair(key, &v.to_string());
        }
    }
    ser.finish()
}

/// Prefix a relative route URL with the configured API base.
pub fn join_base(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    if relative.starts_with('/') {
        format!("{base}{relative}")
    } else {
        format!("{base}/{relative}")
    }
}
