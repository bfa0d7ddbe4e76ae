use crate::errors::DealError;
use reqwest::Url;
use scraper::{Html, Selector};

const SHORTCODE_SELECTOR: &str = "input.photonic-js-load-button";
const SHORTCODE_ATTR: &str = "data-photonic-shortcode";
const DEAL_IMAGE_SELECTOR: &str = "figure.photonic-level-1 img";

fn selector(css: &str) -> Result<Selector, DealError> {
    Selector::parse(css)
        .map_err(|e| DealError::SourceFormat(format!("invalid selector '{}': {:?}", css, e)))
}

/// Pulls the gallery shortcode out of the landing page.
pub fn extract_shortcode(html: &str) -> Result<String, DealError> {
    let document = Html::parse_document(html);
    let input_selector = selector(SHORTCODE_SELECTOR)?;

    document
        .select(&input_selector)
        .filter_map(|element| element.value().attr(SHORTCODE_ATTR))
        .map(str::trim)
        .find(|code| !code.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DealError::SourceFormat("no short code found".to_string()))
}

/// Deal image urls from the AJAX gallery fragment, in page order.
///
/// Relative `src` values are resolved against `base_url`. An empty gallery
/// is treated as a broken response rather than "no deals today".
pub fn extract_deal_urls(html: &str, base_url: &str) -> Result<Vec<String>, DealError> {
    let fragment = Html::parse_fragment(html);
    let image_selector = selector(DEAL_IMAGE_SELECTOR)?;
    let base = Url::parse(base_url).ok();

    let urls: Vec<String> = fragment
        .select(&image_selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| absolutize(src, base.as_ref()))
        .collect();

    if urls.is_empty() {
        return Err(DealError::SourceFormat("no deals found".to_string()));
    }

    Ok(urls)
}

fn absolutize(src: &str, base: Option<&Url>) -> String {
    if src.starts_with("http://") || src.starts_with("https://") {
        return src.to_string();
    }
    match base.and_then(|b| b.join(src).ok()) {
        Some(url) => url.to_string(),
        None => src.to_string(),
    }
}
