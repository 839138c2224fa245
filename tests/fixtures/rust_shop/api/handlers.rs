use crate::models;
use crate::models::Order;

pub struct OrderController;

impl OrderController {
    /// Returns one order.
    ///
    /// @Title getOrder
    /// @Param id path int true "Order id"
    /// @Success 200 {object} Order
    /// @Router /orders/{id} [get]
    pub fn get_order(&self) {}

    /// @Title listCustomers
    /// @Success 200 {array} models.Customer
    /// @Router /customers [get]
    pub fn list_customers(&self) {}
}

#[cfg(test)]
mod tests {
    /// @Router /never [get]
    fn ignored() {}
}
