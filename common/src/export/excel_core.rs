//! Excel生成（共通ライブラリ）
//!
//! レポートをシートごとに書き出す:
//! Riepilogo（集計）/ Trovati（一致）/ Mancanti（欠落）/ Inattesi（想定外）/ Errori（エラー）

use rust_xlsxwriter::*;

use crate::error::{Error, Result};
use crate::types::Report;

fn xlsx_err(context: &str) -> impl Fn(XlsxError) -> Error + '_ {
    move |e| Error::Excel(format!("{}: {}", context, e))
}

/// 見出し行と値の行を1シートに書く
fn write_sheet(
    workbook: &mut Workbook,
    name: &str,
    headers: &[&str],
    rows: &[Vec<String>],
    header_format: &Format,
    value_format: &Format,
) -> Result<()> {
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(name).map_err(xlsx_err("シート名設定エラー"))?;

    for (col, header) in headers.iter().enumerate() {
        let col = col as u16;
        worksheet
            .write_string_with_format(0, col, *header, header_format)
            .map_err(xlsx_err("見出し書き込みエラー"))?;
        let width = rows
            .iter()
            .filter_map(|r| r.get(col as usize))
            .map(|v| v.chars().count())
            .chain(std::iter::once(header.chars().count()))
            .max()
            .unwrap_or(10)
            .clamp(10, 60);
        worksheet
            .set_column_width(col, width as f64 + 2.0)
            .map_err(xlsx_err("列幅設定エラー"))?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        for (col, value) in row.iter().enumerate() {
            worksheet
                .write_string_with_format(r, col as u16, value, value_format)
                .map_err(xlsx_err("値書き込みエラー"))?;
        }
    }

    worksheet.set_freeze_panes(1, 0).map_err(xlsx_err("固定枠設定エラー"))?;
    Ok(())
}

fn yes_no(flag: bool) -> String {
    if flag { "sì" } else { "no" }.to_string()
}

/// Excelをバッファに生成
///
/// # Arguments
/// * `report` - 実行結果
///
/// # Returns
/// xlsxファイルのバイト列
pub fn report_to_xlsx(report: &Report) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_font_size(10.0)
        .set_font_color(Color::RGB(0x333333))
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xAAAAAA));

    let value_format = Format::new()
        .set_font_size(10.0)
        .set_align(FormatAlign::Left)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let s = &report.summary;
    let summary_rows: Vec<Vec<String>> = vec![
        vec!["Generato".into(), report.generated_at.to_rfc3339()],
        vec!["Strategia".into(), s.config.strategy.clone()],
        vec!["Colonne".into(), s.config.columns.join(", ")],
        vec!["Elenco".into(), s.config.index_file.clone().unwrap_or_default()],
        vec!["Collezione".into(), s.config.collection_id.clone().unwrap_or_default()],
        vec!["Ricorsivo".into(), yes_no(s.config.recursive)],
        vec![
            "Pagine massime".into(),
            s.config.max_pages.map(|p| p.to_string()).unwrap_or_default(),
        ],
        vec!["File esclusi".into(), s.config.excluded_files.join(", ")],
        vec!["Attesi".into(), s.total_expected.to_string()],
        vec!["Documenti".into(), s.total_documents.to_string()],
        vec!["Trovati".into(), s.matched.to_string()],
        vec!["Parziali".into(), s.partial.to_string()],
        vec!["Solo codice".into(), s.code_found.to_string()],
        vec!["Solo titolo".into(), s.title_found.to_string()],
        vec!["Mancanti".into(), s.missing.to_string()],
        vec!["Inattesi".into(), s.unexpected.to_string()],
        vec!["Estrazioni fallite".into(), s.extraction_failures.to_string()],
        vec!["Errori".into(), s.errors.to_string()],
    ];
    write_sheet(&mut workbook, "Riepilogo", &["Voce", "Valore"], &summary_rows, &header_format, &value_format)?;

    let match_rows: Vec<Vec<String>> = report
        .matches
        .iter()
        .map(|m| {
            vec![
                m.code.clone(),
                m.title.clone(),
                m.matched_file.clone().unwrap_or_default(),
                m.status.as_str().to_string(),
                yes_no(m.code_found),
                yes_no(m.title_found),
            ]
        })
        .collect();
    write_sheet(
        &mut workbook,
        "Trovati",
        &["Codice", "Titolo", "File", "Stato", "Codice trovato", "Titolo trovato"],
        &match_rows,
        &header_format,
        &value_format,
    )?;

    let missing_rows: Vec<Vec<String>> = report
        .missing
        .iter()
        .map(|m| vec![m.code.clone(), m.title.clone()])
        .collect();
    write_sheet(&mut workbook, "Mancanti", &["Codice", "Titolo"], &missing_rows, &header_format, &value_format)?;

    let unexpected_rows: Vec<Vec<String>> = report
        .unexpected
        .iter()
        .map(|u| vec![u.filename.clone(), u.code.clone()])
        .collect();
    write_sheet(&mut workbook, "Inattesi", &["File", "Codice"], &unexpected_rows, &header_format, &value_format)?;

    let error_rows: Vec<Vec<String>> = report
        .extraction_failures
        .iter()
        .map(|f| vec![f.clone(), "estrazione fallita".to_string()])
        .chain(report.errors.iter().map(|e| vec![e.target.clone(), e.message.clone()]))
        .collect();
    write_sheet(&mut workbook, "Errori", &["Oggetto", "Messaggio"], &error_rows, &header_format, &value_format)?;

    workbook.save_to_buffer().map_err(xlsx_err("Excel保存エラー"))
}
