use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::types::{Field, MarketRecord};

type NodeRef<'a> = ego_tree::NodeRef<'a, Node>;

const RESULTS_TABLE: &str = r#"table[cellpadding="4"]"#;
const NEXT_PAGE_LABEL: &str = "[Next >]";
const WEBSITE_LABEL: &str = "Web Site";
const OFFICE_PHONE_LABEL: &str = "Office Phone";
const HOME_PHONE_LABEL: &str = "Home Phone";

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

/// Collapses whitespace runs (including non-breaking spaces) into single spaces.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn node_text(node: NodeRef) -> Option<&str> {
    node.value().as_text().map(|t| &**t)
}

fn node_plain_text(node: NodeRef) -> String {
    if let Some(text) = node_text(node) {
        return text.to_string();
    }
    ElementRef::wrap(node).map(elem_text).unwrap_or_default()
}

fn parent_name<'a>(node: NodeRef<'a>) -> Option<&'a str> {
    node.parent()
        .and_then(|p| p.value().as_element())
        .map(|e| e.name())
}

fn is_element(node: NodeRef, name: &str) -> bool {
    node.value().as_element().is_some_and(|e| e.name() == name)
}

/// Extracts every market listed in the results table of a directory page.
///
/// Each `td` in the table produces exactly one record, even when none of its
/// fields can be found. Markup without the results table yields no records.
pub fn extract_markets(document: &Html) -> Vec<MarketRecord> {
    let table_selector = Selector::parse(RESULTS_TABLE).unwrap();
    let Some(table) = document.select(&table_selector).next() else {
        log::warn!("Results table ({}) not found on this page", RESULTS_TABLE);
        return Vec::new();
    };

    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("td").unwrap();

    let mut markets = Vec::new();
    for row in table.select(&row_selector) {
        for cell in row.select(&cell_selector) {
            let market = extract_market(cell);
            log::debug!("Extracted market: {:?}", market);
            markets.push(market);
        }
    }

    markets
}

/// Builds one record from a table cell by running every field extractor on it.
pub fn extract_market(cell: ElementRef) -> MarketRecord {
    let mut market = MarketRecord::default();
    for field in Field::ALL {
        market.set(field, field.extract(cell));
    }
    market
}

impl Field {
    /// Finds this field in a table cell. Only the first match counts.
    pub fn extract(self, cell: ElementRef) -> Option<String> {
        match self {
            Field::Name => extract_name(cell),
            Field::Address => extract_address(cell),
            Field::OfficePhone => extract_labeled_phone(cell, OFFICE_PHONE_LABEL),
            Field::HomePhone => extract_labeled_phone(cell, HOME_PHONE_LABEL),
            Field::Website => extract_website(cell),
        }
    }
}

fn extract_name(cell: ElementRef) -> Option<String> {
    let name_selector = Selector::parse("span.style1").unwrap();
    cell.select(&name_selector)
        .next()
        .and_then(|e| non_empty(normalize_whitespace(&elem_text(e))))
}

/// The address is the plain text that follows the first link of the
/// left-aligned paragraph, up to the next `<strong>` or `<a>`.
fn extract_address(cell: ElementRef) -> Option<String> {
    let paragraph_selector = Selector::parse(r#"p[align="left"]"#).unwrap();
    let paragraph = cell.select(&paragraph_selector).next()?;

    let mut parts = Vec::new();
    let mut capturing = false;

    for node in paragraph.descendants() {
        let Some(text) = node_text(node) else {
            continue;
        };
        let parent = parent_name(node);

        if !capturing {
            capturing = parent == Some("a");
            continue;
        }
        if matches!(parent, Some("strong") | Some("a")) {
            break;
        }

        let part = normalize_whitespace(text);
        if !part.is_empty() {
            parts.push(part);
        }
    }

    non_empty(parts.join(" "))
}

/// Phone numbers follow a label such as "Office Phone:" and end at the next
/// line break. The value is the text right before that break. When that text
/// is the label node itself (`Office Phone: 555-0100<br>`), the label and the
/// colon after it are dropped so only the number remains.
fn extract_labeled_phone(cell: ElementRef, label: &str) -> Option<String> {
    let nodes: Vec<NodeRef> = cell.descendants().collect();

    let label_index = nodes
        .iter()
        .position(|n| node_text(*n).is_some_and(|t| t.contains(label)))?;

    let line_break = nodes[label_index + 1..]
        .iter()
        .find(|n| is_element(**n, "br"))?;

    let value = node_plain_text(line_break.prev_sibling()?);
    let value = value
        .split_once(label)
        .map_or(value.as_str(), |(_, rest)| rest)
        .trim_start()
        .trim_start_matches(':');

    non_empty(normalize_whitespace(value))
}

fn extract_website(cell: ElementRef) -> Option<String> {
    let link_selector = Selector::parse("a[href]").unwrap();
    cell.select(&link_selector)
        .find(|a| elem_text(*a).trim() == WEBSITE_LABEL)
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Returns the raw `href` of the "[Next >]" pagination link, if the page has one.
pub fn find_next_page(document: &Html) -> Option<String> {
    let link_selector = Selector::parse("a").unwrap();

    document
        .select(&link_selector)
        .find(|a| elem_text(*a).trim() == NEXT_PAGE_LABEL)
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse_markets(html: &str) -> Vec<MarketRecord> {
        extract_markets(&Html::parse_document(html))
    }

    fn next_page(html: &str) -> Option<String> {
        find_next_page(&Html::parse_document(html))
    }

    #[test]
    fn test_extract_markets_from_fixture() {
        let html = fs::read_to_string("fixtures/directory_page_1.html")
            .expect("Failed to read fixture");

        let markets = parse_markets(&html);

        println!("Parsed {} markets", markets.len());
        for (i, market) in markets.iter().enumerate() {
            println!("Entry {}: {}", i + 1, market);
        }

        assert_eq!(markets.len(), 3);

        let first = &markets[0];
        assert_eq!(first.name.as_deref(), Some("Wake County Farmers Market"));
        assert_eq!(
            first.address.as_deref(),
            Some("2500 Agriculture St Raleigh, NC 27603")
        );
        assert_eq!(first.office_phone.as_deref(), Some("(919) 555-0134"));
        assert_eq!(first.home_phone.as_deref(), Some("(919) 555-0199"));
        assert_eq!(
            first.website.as_deref(),
            Some("http://www.wakefarmersmarket.example")
        );
        assert!(first.zipcode.is_none(), "extractor never sets zipcode");

        let second = &markets[1];
        assert_eq!(second.name.as_deref(), Some("Carrboro Saturday Market"));
        assert_eq!(
            second.address.as_deref(),
            Some("301 W Main St Carrboro, NC 27510")
        );
        assert_eq!(second.office_phone.as_deref(), Some("919-555-0112"));
        assert!(second.home_phone.is_none());
        assert!(second.website.is_none());

        assert!(markets[2].is_empty(), "spacer cell still yields a record");
    }

    #[test]
    fn test_extract_markets_without_results_table() {
        let html = r#"
            <html><body>
                <table cellpadding="2"><tr><td><span class="style1">Hidden</span></td></tr></table>
                <p>No markets here</p>
            </body></html>
        "#;

        assert!(parse_markets(html).is_empty());
        assert!(parse_markets("").is_empty());
        assert!(parse_markets("<div><table").is_empty());
    }

    #[test]
    fn test_extract_name_address_and_website() {
        let html = r##"
            <table cellpadding="4">
                <tr>
                    <td>
                        <span class="style1">Market Name</span>
                        <p align="left">
                            <a href="#">Some Link</a>
                            123 Market St, City, NC 12345
                            <strong>End</strong>
                        </p>
                        <a href="http://example.com">Web Site</a>
                    </td>
                </tr>
            </table>
        "##;

        let markets = parse_markets(html);

        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].name.as_deref(), Some("Market Name"));
        assert_eq!(
            markets[0].address.as_deref(),
            Some("123 Market St, City, NC 12345")
        );
        assert_eq!(markets[0].website.as_deref(), Some("http://example.com"));
        assert!(markets[0].office_phone.is_none());
        assert!(markets[0].home_phone.is_none());
    }

    #[test]
    fn test_address_replaces_non_breaking_spaces() {
        let html = "<table cellpadding=\"4\"><tr><td>\
            <p align=\"left\"><a href=\"/m/1\">Map</a>\u{a0} 12\u{a0}Elm\u{a0}Rd,<br>Boone,\u{a0}NC\u{a0}28607 \u{a0}\
            <strong>Office Phone:</strong> 828-555-0101<br></p>\
            </td></tr></table>";

        let markets = parse_markets(html);

        assert_eq!(markets.len(), 1);
        let address = markets[0].address.as_deref().expect("Should have address");
        assert_eq!(address, "12 Elm Rd, Boone, NC 28607");
        assert!(!address.contains('\u{a0}'));
        assert_eq!(markets[0].office_phone.as_deref(), Some("828-555-0101"));
    }

    #[test]
    fn test_address_requires_leading_link() {
        let html = r#"
            <table cellpadding="4"><tr>
                <td><p align="left">1 Oak St, Cary, NC 27511</p></td>
                <td><span class="style1">No paragraph</span></td>
            </tr></table>
        "#;

        let markets = parse_markets(html);

        assert_eq!(markets.len(), 2);
        assert!(markets[0].address.is_none());
        assert!(markets[1].address.is_none());
        assert_eq!(markets[1].name.as_deref(), Some("No paragraph"));
    }

    #[test]
    fn test_address_stops_at_next_link() {
        let html = r#"
            <table cellpadding="4"><tr><td>
                <p align="left">
                    <a href="/m/2">Directions</a> 9 Pine Ave<br>Wilson, NC 27893
                    <a href="mailto:info@example.com">Email</a> trailing text
                </p>
            </td></tr></table>
        "#;

        let markets = parse_markets(html);

        assert_eq!(
            markets[0].address.as_deref(),
            Some("9 Pine Ave Wilson, NC 27893")
        );
    }

    #[test]
    fn test_only_first_match_per_field() {
        let html = r#"
            <table cellpadding="4"><tr><td>
                <span class="style1">First</span>
                <span class="style1">Second</span>
                <a href="http://first.example">Web Site</a>
                <a href="http://second.example">Web Site</a>
            </td></tr></table>
        "#;

        let markets = parse_markets(html);

        assert_eq!(markets[0].name.as_deref(), Some("First"));
        assert_eq!(markets[0].website.as_deref(), Some("http://first.example"));
    }

    #[test]
    fn test_phone_labels_are_independent() {
        let html = r#"
            <table cellpadding="4"><tr>
                <td>Home Phone: 336-555-0177<br>Other text<br></td>
                <td><strong>Office Phone</strong>: 704-555-0155<br></td>
                <td>Office Phone: with no line break</td>
            </tr></table>
        "#;

        let markets = parse_markets(html);

        assert_eq!(markets.len(), 3);
        assert_eq!(markets[0].home_phone.as_deref(), Some("336-555-0177"));
        assert!(markets[0].office_phone.is_none());
        assert_eq!(markets[1].office_phone.as_deref(), Some("704-555-0155"));
        assert!(markets[1].home_phone.is_none());
        assert!(markets[2].office_phone.is_none());
    }

    #[test]
    fn test_website_requires_exact_label() {
        let html = r#"
            <table cellpadding="4"><tr><td>
                <a href="http://wrong.example">Visit Web Site</a>
                <a>Web Site</a>
                <a href="/markets/7">Web Site</a>
            </td></tr></table>
        "#;

        let markets = parse_markets(html);

        assert_eq!(markets[0].website.as_deref(), Some("/markets/7"));
    }

    #[test]
    fn test_find_next_page() {
        let html = fs::read_to_string("fixtures/directory_page_1.html")
            .expect("Failed to read fixture");
        assert_eq!(
            next_page(&html).as_deref(),
            Some("directory.asp?product=17&SearchType=farmmarkets&page=2")
        );

        let last = fs::read_to_string("fixtures/directory_page_2.html")
            .expect("Failed to read fixture");
        assert!(next_page(&last).is_none());

        assert!(next_page(r#"<a href="?page=3">Next</a>"#).is_none());
        assert!(next_page("<a>[Next &gt;]</a>").is_none());
    }
}
