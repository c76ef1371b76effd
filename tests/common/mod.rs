#![allow(dead_code)]

use std::fs;
use std::path::Path;

use fuelboard::export::write_xlsx_sheets;
use fuelboard::DashboardConfig;
use polars::prelude::*;
use tempfile::TempDir;

pub const SALES_CSV: &str = "\
Data_Facturacao,Emissor,CDst,Material,CE,TipFt,Doc.fat.,Quantidade,V_Liquido,Cambio,Moeda,Vendas m³
2025-03-15,E1,D1,M1,C1,ZF2,F001,100,1000,64,USD,100
2025-04-02,E2,D2,M1,C2,ZF2,F002,50,500,64,USD,50
";

pub const PLAN_CSV: &str = "\
Data_Facturacao,Emissor,CDst,Material,Plano_m³
15/03/2025,E1,D1,M1,120
";

pub const IMPORTS_CSV: &str = "\
NOR,Data_Descarga,Porto,Combustivel,Qtd_Petro_TM,Qtd_FH_( TM),Quantidade_TM,Banco_GB,ValorLimite_GB,Valor_GB,PUMA
2025-02-01,2025-02-03,Maputo,Gasolina,100,50,150,BCI,1000,400,30
2025-02-10,2025-02-12,Beira,Gasolina,200,0,200,BIM,500,500,20
";

pub struct Fixture {
    pub dir: TempDir,
    pub config: DashboardConfig,
}

impl Fixture {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, body: &str) {
        fs::write(self.dir.path().join(name), body).unwrap();
    }
}

pub fn lookup_sheets() -> Vec<(&'static str, DataFrame)> {
    vec![
        (
            "Clientes",
            df!(
                "Emissor" => ["E1", "E2"],
                "Nome_Cliente" => ["Alfa", "Beta"],
                "DataCriacaoCliente" => ["01/02/2020", "15/06/2021"],
            )
            .unwrap(),
        ),
        (
            "Destinos",
            df!("CDst" => ["D1"], "Provincia" => ["Maputo"]).unwrap(),
        ),
        ("Auxiliar", df!("Codigo" => ["X1"]).unwrap()),
        (
            "Sectores",
            df!("CE" => ["C1", "C2"], "Sector/Sigla" => ["Vulcan", "Bunkers"]).unwrap(),
        ),
        (
            "Documentos",
            df!("TipFt" => ["ZF2"], "Tipo_Documento" => ["Factura"]).unwrap(),
        ),
        (
            "Materiais",
            df!("Material" => ["M1"], "Combustivel" => ["Gasolina"]).unwrap(),
        ),
    ]
}

pub fn write_lookup(dir: &Path, sheets: &[(&'static str, DataFrame)]) {
    let refs: Vec<(&str, &DataFrame)> = sheets.iter().map(|(n, df)| (*n, df)).collect();
    write_xlsx_sheets(&refs, &dir.join("lookup.xlsx")).unwrap();
}

/// A directory with every source present.
pub fn fixture() -> Fixture {
    fixture_with_lookup(&lookup_sheets())
}

pub fn fixture_with_lookup(sheets: &[(&'static str, DataFrame)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = DashboardConfig {
        sales_files: vec!["vendas_2024.csv".into(), "vendas_2025.csv".into()],
        plan_files: vec!["plano_2025.csv".into()],
        lookup_file: "lookup.xlsx".into(),
        import_file: "importacao.csv".into(),
        ..DashboardConfig::with_base_path(dir.path())
    };
    let fx = Fixture { dir, config };
    fx.write("vendas_2025.csv", SALES_CSV);
    fx.write("plano_2025.csv", PLAN_CSV);
    fx.write("importacao.csv", IMPORTS_CSV);
    if !sheets.is_empty() {
        write_lookup(fx.path(), sheets);
    }
    fx
}

pub fn strs(df: &DataFrame, name: &str) -> Vec<String> {
    df.column(name)
        .unwrap()
        .cast(&DataType::String)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect()
}

pub fn floats(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}
