use ukcovid19_api::{Cov19Api, Error, Filters, Structure};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Cov19Api {
    Cov19Api::new(
        Filters::new().add("areaType", "nation"),
        Structure::new()
            .field("date", "date")
            .field("newCases", "newCasesByPublishDate"),
    )
    .with_endpoint(&format!("{}/v1/data", server.uri()))
}

fn xml_page(rows: &[(&str, i64)]) -> String {
    let mut body = String::from("<document>");
    body.push_str(&format!("<length>{}</length>", rows.len()));
    body.push_str("<maxPageLimit>1000</maxPageLimit>");
    for (date, cases) in rows {
        body.push_str(&format!(
            "<data><date>{}</date><newCases>{}</newCases></data>",
            date, cases
        ));
    }
    body.push_str("<pagination><current>1</current><next>2</next></pagination>");
    body.push_str("</document>");
    body
}

async fn mount_page(server: &MockServer, page: u32, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/v1/data"))
        .and(query_param("page", page.to_string()))
        .and(query_param("format", "xml"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn two_pages_merge_into_one_finalized_document() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200)
            .set_body_string(xml_page(&[("2021-01-01", 100), ("2021-01-02", 50)]))
            .insert_header("Last-Modified", "Fri, 01 Jan 2021 00:00:00 GMT"),
    )
    .await;
    mount_page(
        &server,
        2,
        ResponseTemplate::new(200)
            .set_body_string(xml_page(&[("2021-01-03", 25), ("2021-01-04", 10)]))
            .insert_header("Last-Modified", "Sat, 02 Jan 2021 00:00:00 GMT"),
    )
    .await;
    mount_page(&server, 3, ResponseTemplate::new(204)).await;

    let root = client_for(&server).get_xml().await.unwrap();

    let data = root.descendants("data");
    assert_eq!(data.len(), 4);
    assert_eq!(data[0].child("date").unwrap().text, "2021-01-01");
    assert_eq!(data[3].child("date").unwrap().text, "2021-01-04");

    // exactly one of each summary element, values covering the whole set
    let lengths: Vec<_> = root.children.iter().filter(|c| c.name == "length").collect();
    assert_eq!(lengths.len(), 1);
    assert_eq!(lengths[0].text, "4");

    let total_pages: Vec<_> = root
        .children
        .iter()
        .filter(|c| c.name == "totalPages")
        .collect();
    assert_eq!(total_pages.len(), 1);
    assert_eq!(total_pages[0].text, "2");

    let last_update: Vec<_> = root
        .children
        .iter()
        .filter(|c| c.name == "lastUpdate")
        .collect();
    assert_eq!(last_update.len(), 1);
    assert_eq!(last_update[0].text, "2021-01-02T00:00:00Z");

    // single-page metadata is stripped after the merge
    assert!(root.descendants("pagination").is_empty());
    assert!(root.descendants("maxPageLimit").is_empty());
}

#[tokio::test]
async fn single_page_document_keeps_root_and_rewrites_length() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string(xml_page(&[("2021-01-01", 100)])),
    )
    .await;
    mount_page(&server, 2, ResponseTemplate::new(204)).await;

    let root = client_for(&server).get_xml().await.unwrap();
    assert_eq!(root.name, "document");
    assert_eq!(root.child("length").unwrap().text, "1");
    assert_eq!(root.child("totalPages").unwrap().text, "1");
    assert_eq!(root.descendants("data").len(), 1);
}

#[tokio::test]
async fn page_without_data_section_is_a_decode_error() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200)
            .set_body_string("<document><length>0</length></document>"),
    )
    .await;

    let err = client_for(&server).get_xml().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn unparsable_page_is_a_decode_error() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string("<document><data>"),
    )
    .await;

    let err = client_for(&server).get_xml().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn empty_dataset_is_a_decode_error_in_document_mode() {
    let server = MockServer::start().await;
    mount_page(&server, 1, ResponseTemplate::new(204)).await;

    let err = client_for(&server).get_xml().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn upstream_error_fails_document_mode_too() {
    let server = MockServer::start().await;
    mount_page(&server, 1, ResponseTemplate::new(503)).await;

    let err = client_for(&server).get_xml().await.unwrap_err();
    assert!(matches!(err, Error::UpstreamStatus { status: 503, .. }));
}
