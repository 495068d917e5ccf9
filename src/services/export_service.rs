use crate::error::{Error, Result};
use crate::models::company::Company;
use crate::models::employee::CompanyEmployee;
use rust_xlsxwriter::*;

pub struct ExportService;

const ROSTER_HEADERS: [&str; 6] = [
    "nome",
    "email",
    "codigo_acesso",
    "sessoes_atribuidas",
    "sessoes_utilizadas",
    "registado",
];

impl ExportService {
    /// Roster with access codes, in the same column order the importer reads.
    pub fn roster_csv(employees: &[CompanyEmployee]) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(ROSTER_HEADERS)?;
        for e in employees {
            let allocated = e.sessions_allocated.to_string();
            let used = e.sessions_used.to_string();
            writer.write_record([
                e.name.as_str(),
                e.email.as_str(),
                e.access_code.as_str(),
                allocated.as_str(),
                used.as_str(),
                if e.registered_at.is_some() { "sim" } else { "não" },
            ])?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::Internal(format!("CSV flush failed: {}", e)))
    }

    pub fn roster_xlsx(company: &Company, employees: &[CompanyEmployee]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Colaboradores")?;

        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let alt_row_1 = Color::RGB(0xF8FAFC);
        let alt_row_2 = Color::White;
        let border_color = Color::RGB(0xE2E8F0);
        let registered_color = Color::RGB(0x10B981);
        let pending_color = Color::RGB(0xF59E0B);

        let columns = [
            ("Nº", 6.0),
            ("Nome", 30.0),
            ("Email", 32.0),
            ("Código de acesso", 18.0),
            ("Sessões atribuídas", 18.0),
            ("Sessões utilizadas", 18.0),
            ("Estado", 14.0),
        ];
        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }
        let last_col = (columns.len() - 1) as u16;

        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(0, 36)?;
        worksheet.merge_range(0, 0, 0, last_col, &company.name, &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(1, 20)?;
        let exported = chrono::Utc::now().format("%d/%m/%Y %H:%M UTC");
        let subtitle = format!(
            "NIF {}  •  Exportado em {}  •  {} colaboradores",
            company.nif,
            exported,
            employees.len()
        );
        worksheet.merge_range(1, 0, 1, last_col, &subtitle, &subtitle_format)?;

        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(Color::White)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let header_row = 2;
        worksheet.set_row_height(header_row, 26)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        let data_start_row = 3;
        for (idx, employee) in employees.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let bg = if idx % 2 == 0 { alt_row_1 } else { alt_row_2 };
            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);
            let code_fmt = center_fmt.clone().set_bold().set_font_name("Consolas");

            worksheet.set_row_height(row, 20)?;
            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center_fmt)?;
            worksheet.write_string_with_format(row, 1, &employee.name, &base_fmt)?;
            worksheet.write_string_with_format(row, 2, &employee.email, &base_fmt)?;
            worksheet.write_string_with_format(row, 3, &employee.access_code, &code_fmt)?;
            worksheet.write_number_with_format(row, 4, employee.sessions_allocated as f64, &center_fmt)?;
            worksheet.write_number_with_format(row, 5, employee.sessions_used as f64, &center_fmt)?;

            let (label, color) = if employee.registered_at.is_some() {
                ("Registado", registered_color)
            } else {
                ("Pendente", pending_color)
            };
            let status_fmt = Format::new()
                .set_font_size(10)
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(color)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            worksheet.write_string_with_format(row, 6, label, &status_fmt)?;
        }

        let total_row = data_start_row + employees.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(primary_color)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let registered = employees.iter().filter(|e| e.registered_at.is_some()).count();
        worksheet.set_row_height(total_row, 24)?;
        worksheet.merge_range(
            total_row,
            0,
            total_row,
            last_col,
            &format!(
                "Registados: {} | Pendentes: {} | Sessões da empresa: {}/{}",
                registered,
                employees.len() - registered,
                company.sessions_used,
                company.sessions_allocated
            ),
            &summary_fmt,
        )?;

        worksheet.set_freeze_panes(data_start_row, 0)?;

        let buf = workbook.save_to_buffer()?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::employee_service::parse_roster;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn employee(name: &str, email: &str, code: &str) -> CompanyEmployee {
        CompanyEmployee {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            user_id: None,
            name: name.into(),
            email: email.into(),
            access_code: code.into(),
            sessions_allocated: 4,
            sessions_used: 1,
            registered_at: None,
            created_at: None,
        }
    }

    #[test]
    fn csv_export_carries_access_codes() {
        let bytes = ExportService::roster_csv(&[
            employee("Ana Silva", "ana@acme.pt", "ABCD2345"),
            employee("Rui, o Grande", "rui@acme.pt", "WXYZ6789"),
        ])
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("nome,email,codigo_acesso,sessoes_atribuidas,sessoes_utilizadas,registado")
        );
        assert_eq!(lines.next(), Some("Ana Silva,ana@acme.pt,ABCD2345,4,1,não"));
        assert_eq!(lines.next(), Some("\"Rui, o Grande\",rui@acme.pt,WXYZ6789,4,1,não"));
    }

    #[test]
    fn exported_roster_reads_back_as_duplicates() {
        let bytes = ExportService::roster_csv(&[employee("Ana", "ana@acme.pt", "ABCD2345")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let existing: HashSet<String> = ["ana@acme.pt".to_string()].into_iter().collect();
        let parsed = parse_roster(&text, &existing);
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.errors[0].line, 2);
    }

    #[test]
    fn xlsx_export_produces_a_workbook() {
        let company = Company {
            id: Uuid::new_v4(),
            name: "Acme Lda".into(),
            nif: "501234567".into(),
            email: None,
            phone: None,
            sessions_allocated: 20,
            sessions_used: 3,
            contract_start_date: None,
            contract_end_date: None,
            is_active: true,
            created_at: None,
            updated_at: None,
        };
        let bytes =
            ExportService::roster_xlsx(&company, &[employee("Ana", "ana@acme.pt", "ABCD2345")]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
