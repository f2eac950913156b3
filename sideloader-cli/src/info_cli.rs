//! Table rendering for the `info` command

use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use sideloader_core::diagnostics::{AddinDirectory, InfoReport};
use sideloader_core::registry::RegistryRow;
use sideloader_core::share::{ACCESS_READ, SHI_USES_UNLIMITED, STYPE_DISKTREE};

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct ShareRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Type")]
    share_type: String,
    #[tabled(rename = "Permissions")]
    permissions: String,
    #[tabled(rename = "Max uses")]
    max_uses: String,
    #[tabled(rename = "Current uses")]
    current_uses: u32,
    #[tabled(rename = "Remark")]
    remark: String,
}

#[derive(Tabled)]
struct RegistryTableRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Attribute")]
    attribute: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Type")]
    value_type: String,
}

#[derive(Tabled)]
struct AddinRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn render<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return "Nothing".to_string();
    }
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

fn or_dash(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

fn registry_rows(rows: &[RegistryRow]) -> Vec<RegistryTableRow> {
    rows.iter()
        .map(|row| RegistryTableRow {
            key: row.key.clone(),
            attribute: row.attribute.clone(),
            value: row.value.to_string(),
            value_type: row.value_type().to_string(),
        })
        .collect()
}

fn addin_rows(dir: &AddinDirectory) -> Vec<AddinRow> {
    dir.manifests
        .iter()
        .map(|listed| match &listed.descriptor {
            Some(d) => AddinRow {
                id: d.id.clone(),
                version: or_dash(&d.version),
                provider: or_dash(&d.provider_name),
                name: or_dash(&d.display_name),
                description: or_dash(&d.description),
            },
            None => AddinRow {
                id: listed
                    .file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                version: "-".to_string(),
                provider: "-".to_string(),
                name: "-".to_string(),
                description: listed.error.clone().unwrap_or_default(),
            },
        })
        .collect()
}

fn share_rows(report: &InfoReport) -> Vec<ShareRow> {
    report
        .shares
        .iter()
        .map(|share| ShareRow {
            name: share.name.clone(),
            path: share.path.display().to_string(),
            share_type: if share.share_type == STYPE_DISKTREE {
                "disk".to_string()
            } else {
                format!("{:#x}", share.share_type)
            },
            permissions: if share.permissions == ACCESS_READ {
                "read".to_string()
            } else {
                format!("{:#x}", share.permissions)
            },
            max_uses: if share.max_uses == SHI_USES_UNLIMITED {
                "unlimited".to_string()
            } else {
                share.max_uses.to_string()
            },
            current_uses: share.current_uses,
            remark: share.remark.clone(),
        })
        .collect()
}

pub fn print_info(report: &InfoReport) {
    let system = [
        PropertyRow {
            name: "OS",
            value: report.system.os.clone(),
        },
        PropertyRow {
            name: "Family",
            value: report.system.family.clone(),
        },
        PropertyRow {
            name: "Architecture",
            value: report.system.arch.clone(),
        },
        PropertyRow {
            name: "Server name",
            value: report.system.server_name.clone(),
        },
        PropertyRow {
            name: "Sideloader version",
            value: report.system.version.clone(),
        },
    ];

    println!("System:\n{}\n", render(&system));
    println!("Shares:\n{}\n", render(&share_rows(report)));
    println!("Providers:\n{}\n", render(&registry_rows(&report.providers)));
    println!("Catalogs:\n{}\n", render(&registry_rows(&report.catalogs)));
    for dir in &report.addins {
        println!("Add-ins in {}:\n{}\n", dir.path.display(), render(&addin_rows(dir)));
    }
}
