//! `encode` and `decode` commands

use cardcloak::codec;
use cardcloak::error::Result;
use cardcloak::proxy::TARGET_PARAM;

/// Print the token for `url`, or a full proxy link when `base` is given
pub fn encode(url: &str, base: Option<&str>) -> Result<()> {
    println!("{}", link(url, base));
    Ok(())
}

/// Print the URL a token resolves to
pub fn decode(token: &str) -> Result<()> {
    println!("{}", codec::decode(token)?);
    Ok(())
}

fn link(url: &str, base: Option<&str>) -> String {
    let token = codec::encode(url);
    match base {
        Some(base) => {
            let query: String = url::form_urlencoded::Serializer::new(String::new())
                .append_pair(TARGET_PARAM, &token)
                .finish();
            format!("{}/?{}", base.trim_end_matches('/'), query)
        }
        None => token,
    }
}
