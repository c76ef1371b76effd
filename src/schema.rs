/// Column-name constants for the dashboard datasets.
/// Single source of truth - every loader, join and table refers to these.

// ── Sales columns ───────────────────────────────────────────────────────────
pub mod sales {
    pub const INVOICE_DATE: &str = "Data_Facturacao";
    pub const ISSUER: &str = "Emissor";
    pub const DESTINATION: &str = "CDst";
    pub const MATERIAL: &str = "Material";
    pub const SECTOR_KEY: &str = "CE";
    pub const DOC_TYPE: &str = "TipFt";
    pub const DOC_NUMBER: &str = "Doc.fat.";
    pub const DOC_TYPE_NAME: &str = "Tipo.Factura";
    pub const DESCRIPTION: &str = "Denominação";
    pub const QUANTITY: &str = "Quantidade";
    pub const RATE: &str = "Cambio";
    pub const CURRENCY: &str = "Moeda";

    pub const NET_VALUE: &str = "V_Liquido";
    pub const TAX: &str = "V_Imposto";
    pub const PRODUCT_COST: &str = "Custo_Produto";
    pub const MARGIN: &str = "Margem_Vendas";
    pub const OCEAN_SALE: &str = "V_Venda_Oceanica";
    pub const DISCOUNT: &str = "Desconto";
    pub const EXCISE: &str = "Valor_ISC";

    pub const MONETARY: [&str; 7] = [
        NET_VALUE,
        TAX,
        PRODUCT_COST,
        MARGIN,
        OCEAN_SALE,
        DISCOUNT,
        EXCISE,
    ];

    /// Suffix of the local-currency (metical) derived columns.
    pub const LOCAL_SUFFIX: &str = "_MT";
    /// Suffix of the hard-currency (dollar) derived columns.
    pub const HARD_SUFFIX: &str = "_USD";

    pub const YEAR: &str = "Ano";
    pub const MONTH: &str = "Mes";
    pub const DAY: &str = "Dia";

    pub const FUEL: &str = "Combustivel";
    pub const BUSINESS_LINE: &str = "Sector/Sigla";
    pub const PROMOTER: &str = "Gestor / Promotor";
    pub const INSTALLATION: &str = "Instalacao";
    pub const PROVINCE: &str = "Provincia";

    /// Minimum columns a usable sales dataset must carry.
    pub const REQUIRED: [&str; 3] = [INVOICE_DATE, QUANTITY, NET_VALUE];

    /// Columns made redundant once the lookups have been joined.
    pub const CONSUMED_BY_JOIN: [&str; 6] =
        [DOC_NUMBER, DOC_TYPE_NAME, DOC_TYPE, DESCRIPTION, RATE, CURRENCY];

    /// Realized-volume candidates, most specific first.
    pub const REALIZED_CANDIDATES: [&str; 4] = ["Vendas m³", NET_VALUE, QUANTITY, "Vendas"];
}

// ── Plan columns ────────────────────────────────────────────────────────────
pub mod plan {
    use super::sales;

    pub const DATE_FORMAT: &str = "%d/%m/%Y";

    /// Composite key shared with the sales dataset.
    pub const KEY: [&str; 4] = [
        sales::INVOICE_DATE,
        sales::ISSUER,
        sales::DESTINATION,
        sales::MATERIAL,
    ];

    /// Planned-volume candidates, most specific first.
    pub const PLANNED_CANDIDATES: [&str; 3] = ["Plano_m³", "Plano", "Quantidade_Plano"];
}

// ── Lookup columns ──────────────────────────────────────────────────────────
pub mod lookup {
    pub const CUSTOMER_CREATED: &str = "DataCriacaoCliente";
    pub const CUSTOMER_CREATED_FORMAT: &str = "%d/%m/%Y";
    pub const SHEET_COUNT: usize = 6;
}

// ── Import columns ──────────────────────────────────────────────────────────
pub mod import {
    pub const NOR_DATE: &str = "NOR";
    pub const DISCHARGE_DATE: &str = "Data_Descarga";
    pub const PORT: &str = "Porto";
    pub const FUEL: &str = "Combustivel";
    pub const DISCHARGE_STATUS: &str = "Situacao_Descarga";
    pub const RELEASE_TM: &str = "Qtd_Petro_TM";
    pub const FINANCIAL_HOLD_TM: &str = "Qtd_FH_( TM)";
    pub const QUANTITY_TM: &str = "Quantidade_TM";
    pub const QUANTITY: &str = "Quantidade";
    pub const BANK: &str = "Banco_GB";
    pub const GUARANTEE_LIMIT: &str = "ValorLimite_GB";
    pub const GUARANTEE_USED: &str = "Valor_GB";

    pub const DATE_COLUMNS: [&str; 2] = [NOR_DATE, DISCHARGE_DATE];

    pub const MASS_COLUMNS: [&str; 4] = [RELEASE_TM, FINANCIAL_HOLD_TM, QUANTITY_TM, QUANTITY];

    /// Columns probed, in order, for the dominant fuel of a filtered frame.
    pub const FUEL_CANDIDATES: [&str; 4] = [
        "Combustivel_Vendas",
        "Combustivel_Importacao",
        FUEL,
        "Material",
    ];

    /// Upper-cased fragments identifying the release column.
    pub const RELEASE_MARKERS: [&str; 3] = ["RELEASE", "PETRO_TM", "QTD_PETRO"];
    /// Upper-cased fragments identifying the financial-hold column.
    pub const FINANCIAL_HOLD_MARKERS: [&str; 3] = ["FINANCIAL", "FH", "QTD_FH"];
    /// Upper-cased fragment identifying the port column.
    pub const PORT_MARKER: &str = "PORTO";
}

// ── Output tables ───────────────────────────────────────────────────────────
pub const TOTAL_ROW: &str = "TOTAL GERAL";

pub mod business_line {
    pub const LINE: &str = "Linha de Negócio";
    pub const REALIZED: &str = "Vendas (m³)";
    pub const PLANNED: &str = "Plano (m³)";
    pub const VARIANCE: &str = "Variação (m³)";
    pub const VARIANCE_PCT: &str = "Variação (%)";
    pub const STATUS: &str = "Status";
}

pub mod port {
    pub const PORT: &str = "Porto";
    pub const RELEASE: &str = "RELEASE";
    pub const FINANCIAL_HOLD: &str = "FINANCIAL HOLD";
    pub const FINANCIAL_HOLD_PCT: &str = "% FINANCIAL HOLD";
}

pub mod guarantee {
    pub const BANK: &str = "Banco_GB";
    pub const LIMIT: &str = "ValorLimite_GB";
    pub const USED: &str = "Valor_GB";
    pub const AVAILABLE: &str = "Disponibilidade_GB";
    pub const AVAILABLE_PCT: &str = "Disponibilidade_%";
}

pub mod monthly {
    pub const YEAR: &str = "Ano";
    pub const MONTH: &str = "Mes";
    pub const PERIOD: &str = "Periodo";
    pub const REALIZED: &str = "Vendas";
    pub const PLANNED: &str = "Plano";
}
