use serde::Deserialize;

/// Storage class of a destination column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
}

/// A column of the destination table.
#[derive(Clone, Copy, Debug)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
}

const fn col(name: &'static str, kind: ColumnType) -> Column {
    Column { name, kind }
}

/// Fixed column contract shared by the source file header (after upper-casing)
/// and the destination table, in table order.
pub const COLUMNS: [Column; 17] = [
    col("INVOICENO", ColumnType::Text),
    col("STOCKCODE", ColumnType::Text),
    col("DESCRIPTION", ColumnType::Text),
    col("QUANTITY", ColumnType::Integer),
    col("INVOICEDATE", ColumnType::Text),
    col("UNITPRICE", ColumnType::Float),
    col("CUSTOMERID", ColumnType::Float),
    col("COUNTRY", ColumnType::Text),
    col("DISCOUNT", ColumnType::Float),
    col("PAYMENTMETHOD", ColumnType::Text),
    col("SHIPPINGCOST", ColumnType::Float),
    col("CATEGORY", ColumnType::Text),
    col("SALESCHANNEL", ColumnType::Text),
    col("RETURNSTATUS", ColumnType::Text),
    col("SHIPMENTPROVIDER", ColumnType::Text),
    col("WAREHOUSELOCATION", ColumnType::Text),
    col("ORDERPRIORITY", ColumnType::Text),
];

/// Name of the timestamp column used for partitioning.
pub const DATE_COLUMN: &str = "INVOICEDATE";

/// One sales line. `invoice_date` holds the canonical `YYYY-MM-DD HH:MM:SS`
/// string once the row has been through the loader.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Row {
    #[serde(rename = "INVOICENO")]
    pub invoice_no: String,
    #[serde(rename = "STOCKCODE")]
    pub stock_code: Option<String>,
    #[serde(rename = "DESCRIPTION")]
    pub description: Option<String>,
    #[serde(rename = "QUANTITY")]
    pub quantity: Option<i64>,
    #[serde(rename = "INVOICEDATE")]
    pub invoice_date: String,
    #[serde(rename = "UNITPRICE")]
    pub unit_price: Option<f64>,
    #[serde(rename = "CUSTOMERID")]
    pub customer_id: Option<f64>,
    #[serde(rename = "COUNTRY")]
    pub country: Option<String>,
    #[serde(rename = "DISCOUNT")]
    pub discount: Option<f64>,
    #[serde(rename = "PAYMENTMETHOD")]
    pub payment_method: Option<String>,
    #[serde(rename = "SHIPPINGCOST")]
    pub shipping_cost: Option<f64>,
    #[serde(rename = "CATEGORY")]
    pub category: Option<String>,
    #[serde(rename = "SALESCHANNEL")]
    pub sales_channel: Option<String>,
    #[serde(rename = "RETURNSTATUS")]
    pub return_status: Option<String>,
    #[serde(rename = "SHIPMENTPROVIDER")]
    pub shipment_provider: Option<String>,
    #[serde(rename = "WAREHOUSELOCATION")]
    pub warehouse_location: Option<String>,
    #[serde(rename = "ORDERPRIORITY")]
    pub order_priority: Option<String>,
}

/// A single typed value, borrowed from a `Row`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cell<'a> {
    Text(Option<&'a str>),
    Integer(Option<i64>),
    Float(Option<f64>),
}

impl Cell<'_> {
    /// Text rendering used for string bindings; `None` for nulls.
    pub fn render(&self) -> Option<String> {
        match self {
            Cell::Text(v) => v.map(str::to_string),
            Cell::Integer(v) => v.map(|n| n.to_string()),
            Cell::Float(v) => v.map(|n| n.to_string()),
        }
    }
}

impl Row {
    /// Values in `COLUMNS` order.
    pub fn cells(&self) -> [Cell<'_>; 17] {
        [
            Cell::Text(Some(self.invoice_no.as_str())),
            Cell::Text(self.stock_code.as_deref()),
            Cell::Text(self.description.as_deref()),
            Cell::Integer(self.quantity),
            Cell::Text(Some(self.invoice_date.as_str())),
            Cell::Float(self.unit_price),
            Cell::Float(self.customer_id),
            Cell::Text(self.country.as_deref()),
            Cell::Float(self.discount),
            Cell::Text(self.payment_method.as_deref()),
            Cell::Float(self.shipping_cost),
            Cell::Text(self.category.as_deref()),
            Cell::Text(self.sales_channel.as_deref()),
            Cell::Text(self.return_status.as_deref()),
            Cell::Text(self.shipment_provider.as_deref()),
            Cell::Text(self.warehouse_location.as_deref()),
            Cell::Text(self.order_priority.as_deref()),
        ]
    }
}
