// End-to-end extraction through the driver with a scripted extractor
use rstest::rstest;
use std::path::Path;
use std::sync::Mutex;
use tablemark::pdf_extraction::{ExtractionRequest, Table};
use tablemark::{
    CoordinateMapper, DeviceRect, ExtractionDriver, ExtractionStatus, GeometryModel, PageMetrics,
    PageTemplate, Section, TableExtractor, Template,
};

/// Echoes the requested area back as a two-cell row and records every call
#[derive(Default)]
struct EchoExtractor {
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl TableExtractor for EchoExtractor {
    fn extract(&self, request: &ExtractionRequest) -> anyhow::Result<Option<Table>> {
        self.requests.lock().unwrap().push(request.clone());
        let area = request.area_string();
        Ok(Some(Table::from_strs(&[&["area", area.as_str()]])))
    }
}

fn letter_mapper() -> CoordinateMapper {
    CoordinateMapper::new(PageMetrics {
        content_width: 612.0,
        content_height: 792.0,
        pixel_width: 1224,
        pixel_height: 1584,
    })
    .unwrap()
}

fn template_from(model: &GeometryModel) -> Template {
    let mut template = Template::single("Acme Invoice", PageTemplate::default());
    template.set_geometry(model);
    template
}

#[test]
fn test_drawn_region_reaches_extractor_in_content_space() {
    let mapper = letter_mapper();
    let mut model = GeometryModel::new();
    model
        .add_region_from_device(1, Section::Header, &DeviceRect::new(100.0, 50.0, 300.0, 40.0), &mapper)
        .unwrap();

    let extractor = EchoExtractor::default();
    let report = ExtractionDriver::new(&extractor).extract(Path::new("invoice.pdf"), &template_from(&model));

    let requests = extractor.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].area_string(), "50,767,200,747");
    assert_eq!(requests[0].pages, "1");
    assert_eq!(requests[0].columns, None);
    assert_eq!(report.status, ExtractionStatus::Success);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(6)]
fn test_header_results_follow_drawing_order(#[case] count: usize) {
    // Drawn bottom-up, so screen position disagrees with drawing order
    let mapper = letter_mapper();
    let mut model = GeometryModel::new();
    let mut expected_areas = Vec::new();
    for i in 0..count {
        let device = DeviceRect::new(40.0, 1400.0 - 200.0 * i as f64, 400.0, 120.0);
        let region = model.add_region_from_device(1, Section::Header, &device, &mapper).unwrap();
        assert_eq!(region.order_index, i);
        expected_areas.push(region.rect.area_string());
    }

    let report = ExtractionDriver::new(EchoExtractor::default())
        .extract(Path::new("invoice.pdf"), &template_from(&model));

    assert_eq!(report.header.len(), count);
    for (i, result) in report.header.iter().enumerate() {
        assert_eq!(result.order_index, i);
        assert_eq!(result.label, format!("header_table_{}", i + 1));
        let table = result.table.as_ref().unwrap();
        assert_eq!(table.rows[0][1].as_deref(), Some(expected_areas[i].as_str()));
    }
}

#[test]
fn test_columns_are_sent_sorted() {
    let mapper = letter_mapper();
    let mut model = GeometryModel::new();
    model
        .add_region_from_device(1, Section::Items, &DeviceRect::new(0.0, 600.0, 1200.0, 600.0), &mapper)
        .unwrap();
    for device_x in [900.0, 300.0, 600.0] {
        model.add_column_from_device(1, device_x, 900.0, &mapper).unwrap();
    }

    let extractor = EchoExtractor::default();
    ExtractionDriver::new(&extractor).extract(Path::new("invoice.pdf"), &template_from(&model));

    let requests = extractor.requests.lock().unwrap();
    assert_eq!(requests[0].columns_string().as_deref(), Some("150,300,450"));
}

#[test]
fn test_driver_is_shared_across_threads() {
    let mapper = letter_mapper();
    let mut model = GeometryModel::new();
    model
        .add_region_from_device(1, Section::Summary, &DeviceRect::new(600.0, 1300.0, 500.0, 150.0), &mapper)
        .unwrap();
    let template = template_from(&model);
    let extractor = EchoExtractor::default();
    let driver = ExtractionDriver::new(&extractor);

    let files = ["a.pdf", "b.pdf", "c.pdf", "d.pdf"];
    let statuses: Vec<ExtractionStatus> = std::thread::scope(|scope| {
        let handles: Vec<_> = files
            .iter()
            .map(|file| {
                let driver = &driver;
                let template = &template;
                scope.spawn(move || driver.extract(Path::new(file), template).status)
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(statuses.iter().all(|s| *s == ExtractionStatus::Success));
    let mut seen: Vec<String> = extractor
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.pdf_path.display().to_string())
        .collect();
    seen.sort();
    assert_eq!(seen, files);
}
