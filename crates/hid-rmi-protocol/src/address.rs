//! Paged 16-bit RMI4 addressing.
//!
//! RMI4 registers live in a 16-bit address space, but several physical
//! transports only carry 8-bit register offsets. The space is therefore split
//! into 256-register pages, and register `0xFF` of every page is the page
//! select register.

/// Number of registers in one page.
pub const RMI4_PAGE_SIZE: u16 = 0x0100;

/// Highest page index that can hold a Page Description Table.
pub const RMI4_MAX_PAGE: u8 = 0xFF;

/// Offset of the page select register inside every page.
pub const PAGE_SELECT_REGISTER: u8 = 0xFF;

/// Page that holds `addr`.
pub const fn rmi_page(addr: u16) -> u8 {
    (addr >> 8) as u8
}

/// First address of `page`.
pub const fn page_base(page: u8) -> u16 {
    (page as u16) << 8
}

/// Address of the page select register as seen from `page`.
pub const fn page_select_address(page: u8) -> u16 {
    page_base(page) | PAGE_SELECT_REGISTER as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmi_page() {
        assert_eq!(rmi_page(0x0000), 0x00);
        assert_eq!(rmi_page(0x00FF), 0x00);
        assert_eq!(rmi_page(0x0100), 0x01);
        assert_eq!(rmi_page(0x04E9), 0x04);
        assert_eq!(rmi_page(0xFFFF), 0xFF);
    }

    #[test]
    fn test_page_base_and_select() {
        assert_eq!(page_base(0), 0x0000);
        assert_eq!(page_base(3), 0x0300);
        assert_eq!(page_select_address(0), 0x00FF);
        assert_eq!(page_select_address(2), 0x02FF);
    }
}
